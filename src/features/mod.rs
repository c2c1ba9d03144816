//! Derived columns, declared as a dependency graph.
//!
//! Every feature names its inputs. The registry orders evaluation with a
//! topological sort over feature-to-feature edges, so registration order
//! never matters for correctness. Output column order is stable: the input
//! columns first, then new features in registration order.

pub mod calendar;
pub mod delivery;
pub mod flags;
pub mod volume;

use anyhow::Result;
use arrow::{array::ArrayRef, record_batch::RecordBatch};
use petgraph::{
    algo::toposort,
    graph::{DiGraph, NodeIndex},
};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::config::FeatureConfig;
use crate::error::{CleanError, FeatureError};
use crate::table::with_column;

pub type ComputeFn = Box<dyn Fn(&RecordBatch) -> Result<ArrayRef, CleanError>>;

pub struct FeatureDef {
    pub name: String,
    pub inputs: Vec<String>,
    compute: ComputeFn,
}

impl FeatureDef {
    pub fn new<F>(name: &str, inputs: &[&str], compute: F) -> Self
    where
        F: Fn(&RecordBatch) -> Result<ArrayRef, CleanError> + 'static,
    {
        Self {
            name: name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            compute: Box::new(compute),
        }
    }
}

impl std::fmt::Debug for FeatureDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureDef")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct FeatureRegistry {
    defs: Vec<FeatureDef>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: FeatureDef) -> &mut Self {
        self.defs.push(def);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.defs.iter().map(|d| d.name.as_str()).collect()
    }

    /// The eleven order-level features.
    pub fn standard(cfg: &FeatureConfig) -> Self {
        let date = cfg.order_date_column.as_str();
        let mut reg = Self::new();
        reg.register(calendar::order_year(date))
            .register(calendar::order_month(date))
            .register(calendar::order_quarter(date))
            .register(calendar::order_day(date))
            .register(delivery::on_time_delivery())
            .register(delivery::delay_days())
            .register(flags::is_weekend())
            .register(flags::is_bulk_order(cfg.bulk_percentile))
            .register(flags::is_international())
            .register(volume::market_volume())
            .register(volume::country_volume());
        reg
    }

    /// Indices into the registration list, dependencies first.
    pub fn evaluation_order(&self, columns: &[String]) -> Result<Vec<usize>, FeatureError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut by_name: HashMap<&str, NodeIndex> = HashMap::with_capacity(self.defs.len());
        for (i, def) in self.defs.iter().enumerate() {
            by_name.insert(def.name.as_str(), graph.add_node(i));
        }

        for def in &self.defs {
            let to = by_name[def.name.as_str()];
            for input in &def.inputs {
                if let Some(&from) = by_name.get(input.as_str()) {
                    graph.add_edge(from, to, ());
                } else if !columns.iter().any(|c| c == input) {
                    return Err(FeatureError::MissingInput {
                        feature: def.name.clone(),
                        input: input.clone(),
                    });
                }
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| FeatureError::Cycle {
            feature: self.defs[graph[cycle.node_id()]].name.clone(),
        })?;
        Ok(sorted.into_iter().map(|n| graph[n]).collect())
    }

    /// Compute every registered feature over `batch`. Existing columns with a
    /// feature's name are replaced in place.
    #[instrument(level = "info", skip_all, fields(rows = batch.num_rows(), features = self.defs.len()))]
    pub fn derive(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let schema = batch.schema();
        let original: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let order = self.evaluation_order(&original)?;

        let mut out = batch.clone();
        for i in order {
            let def = &self.defs[i];
            let array = (def.compute)(&out).map_err(|source| FeatureError::Compute {
                feature: def.name.clone(),
                source,
            })?;
            debug!(feature = %def.name, "derived");
            out = with_column(&out, &def.name, array)?;
        }

        // originals keep their slots, new features follow in registration order
        let out_schema = out.schema();
        let mut projection = Vec::with_capacity(out.num_columns());
        for name in original
            .iter()
            .map(String::as_str)
            .chain(self.names().into_iter().filter(|n| !original.iter().any(|o| o == n)))
        {
            projection.push(out_schema.index_of(name)?);
        }
        let out = out.project(&projection)?;

        info!(
            rows = out.num_rows(),
            columns = out.num_columns(),
            "features derived"
        );
        Ok(out)
    }
}
