use serde::{Deserialize, Serialize};

/// One transform request against a source table. The engine applies the
/// stages in a fixed order: row numbering, filtering, grouping/binning,
/// ordering, projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub filters: Vec<ColumnFilter>,
    pub order_by: Vec<SortConstraint>,
    pub group_by: Option<GroupBySpec>,
    /// Output alias for a 1-based row-number column computed over the source
    /// row order, before any filtering.
    pub row_number: Option<String>,
    /// Field-name allow-list applied last.
    pub projection: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Between,
    NotBetween,
    IsNull,
    NotNull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Range { low: f64, high: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortConstraint {
    pub field: String,
    pub ascending: bool,
    pub nulls_first: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBySpec {
    /// Empty keys collapse the whole table into a single aggregate row.
    pub keys: Vec<GroupKey>,
    pub aggregates: Vec<AggregateSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupKey {
    pub field: String,
    pub binning: Option<BinningSpec>,
}

/// Equal-width binning over a numeric key. The bin bounds come from a
/// previously computed stats table submitted alongside the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningSpec {
    pub stats_min_field: String,
    pub stats_max_field: String,
    pub bin_count: u32,
    pub index_alias: String,
    pub width_alias: String,
    pub lower_alias: String,
    pub upper_alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    /// `None` means count-star.
    pub field: Option<String>,
    pub alias: String,
    pub func: AggregateFn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFn {
    Min,
    Max,
    Sum,
    Mean,
    CountStar,
}
