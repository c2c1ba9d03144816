use arrow::datatypes::DataType;

/// Infer a column's Arrow type from its present (non-missing) cells.
///
/// - `Int64` when every present cell is an integer and no cell is missing
/// - `Float64` when every present cell parses as a float
/// - `Utf8` otherwise, including columns with no present cells
pub fn infer_column_type<'a, I>(cells: I) -> DataType
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut seen = false;
    let mut any_missing = false;
    let mut all_int = true;
    let mut all_float = true;

    for cell in cells {
        let Some(raw) = cell else {
            any_missing = true;
            continue;
        };
        seen = true;
        let v = raw.trim();
        if all_int && v.parse::<i64>().is_err() {
            all_int = false;
        }
        if !all_int && v.parse::<f64>().is_err() {
            all_float = false;
            break;
        }
    }

    match (seen, all_int, all_float) {
        (false, _, _) => DataType::Utf8,
        (true, true, _) if !any_missing => DataType::Int64,
        (true, _, true) => DataType::Float64,
        _ => DataType::Utf8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(
            infer_column_type(vec![Some("1"), Some(" 2 "), Some("-3")]),
            DataType::Int64
        );
    }

    #[test]
    fn test_integers_with_gap_widen_to_float() {
        assert_eq!(
            infer_column_type(vec![Some("1"), None, Some("3")]),
            DataType::Float64
        );
    }

    #[test]
    fn test_mixed_numbers_are_float() {
        assert_eq!(
            infer_column_type(vec![Some("1"), Some("2.5")]),
            DataType::Float64
        );
    }

    #[test]
    fn test_text() {
        assert_eq!(
            infer_column_type(vec![Some("1"), Some("LATAM")]),
            DataType::Utf8
        );
    }

    #[test]
    fn test_all_missing_is_text() {
        assert_eq!(infer_column_type(vec![None, None]), DataType::Utf8);
    }
}
