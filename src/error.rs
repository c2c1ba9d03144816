use thiserror::Error;

/// Fatal cleaning failures. Nothing here is recovered locally.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("column `{column}` row {row}: cannot parse date from {value:?}")]
    DateParse {
        column: String,
        row: usize,
        value: String,
    },

    #[error("required column `{column}` not found")]
    MissingColumn { column: String },

    #[error("column `{column}` has type {found}, expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
        found: String,
    },

    #[error("duplicate column `{column}` after name normalization")]
    DuplicateColumn { column: String },
}

/// A single failed translation attempt. The retry layer turns exhaustion
/// into a pass-through, so this never aborts a run.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Request(String),

    #[error("translation service returned status {status}")]
    Status { status: u16 },

    #[error("unexpected translation response: {0}")]
    Response(String),
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("feature `{feature}` needs input `{input}` which is neither a column nor a feature")]
    MissingInput { feature: String, input: String },

    #[error("feature definitions contain a dependency cycle through `{feature}`")]
    Cycle { feature: String },

    #[error("feature `{feature}`: {source}")]
    Compute {
        feature: String,
        #[source]
        source: CleanError,
    },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{partition} partition is empty")]
    EmptyPartition { partition: &'static str },

    #[error("training labels contain a single class ({class})")]
    SingleClass { class: i32 },

    #[error("label `{value}` in row {row} is not a 0/1 class")]
    InvalidLabel { row: usize, value: String },

    #[error("feature `{feature}` has no value in row {row}")]
    MissingValue { feature: String, row: usize },

    #[error("training failed: {0}")]
    Training(String),

    #[error("prediction failed: {0}")]
    Prediction(String),
}
