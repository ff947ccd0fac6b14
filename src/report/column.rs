use crate::report::schema::ColumnType;

/// Columnar storage for one field of the ratings table.
///
/// Each variant holds one chunk per parse batch; string cells are absolute
/// byte offsets into the memory-mapped source.
#[derive(Debug, Clone)]
pub enum Column {
    Int64(Vec<Vec<i64>>),
    Float64(Vec<Vec<f64>>),
    Bool(Vec<Vec<bool>>),
    Str(Vec<Vec<(usize, usize)>>),
}

impl Column {
    pub fn new_for(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Int64 => Column::Int64(Vec::new()),
            ColumnType::Float64 => Column::Float64(Vec::new()),
            ColumnType::Bool => Column::Bool(Vec::new()),
            ColumnType::Str => Column::Str(Vec::new()),
        }
    }

    // Efficient iteration over the two columns the aggregation consumes;
    // numeric columns are held for schema coercion only.
    pub fn iter_bool(&self) -> impl Iterator<Item = bool> + '_ {
        if let Column::Bool(chunks) = self {
            chunks.iter().flat_map(|chunk| chunk.iter().copied())
        } else {
            panic!("Wrong type")
        }
    }

    pub fn iter_str(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        if let Column::Str(chunks) = self {
            chunks.iter().flat_map(|chunk| chunk.iter().copied())
        } else {
            panic!("Wrong type")
        }
    }

    pub fn total_len(&self) -> usize {
        match self {
            Column::Int64(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Float64(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Bool(chunks) => chunks.iter().map(|c| c.len()).sum(),
            Column::Str(chunks) => chunks.iter().map(|c| c.len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_len_spans_chunks() {
        let col = Column::Int64(vec![vec![1, 2], vec![3]]);
        assert_eq!(col.total_len(), 3);
    }

    #[test]
    fn test_bool_column_flattens_chunks() {
        let col = Column::Bool(vec![vec![true], vec![false, true]]);
        assert_eq!(
            col.iter_bool().collect::<Vec<_>>(),
            vec![true, false, true]
        );
    }

    #[test]
    fn test_str_column_flattens_chunks() {
        let col = Column::Str(vec![vec![(0, 4)], vec![(5, 9)]]);
        assert_eq!(col.iter_str().collect::<Vec<_>>(), vec![(0, 4), (5, 9)]);
    }
}
