//! Vector distance metric shared by schema provisioning and query construction.
//!
//! The metric an index is built with and the operator a query orders by must
//! agree. Both sides derive their SQL from this enum.

use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, range `[0, 2]`.
    Cosine,
    /// Negative inner product. Can go below zero; more similar is still smaller.
    DotProduct,
    /// L2 distance.
    Euclidean,
}

impl DistanceMetric {
    /// pgvector distance operator.
    pub fn operator(self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "<=>",
            DistanceMetric::DotProduct => "<#>",
            DistanceMetric::Euclidean => "<->",
        }
    }

    /// Operator class for an HNSW index supporting `operator()`.
    pub fn index_ops(self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "vector_cosine_ops",
            DistanceMetric::DotProduct => "vector_ip_ops",
            DistanceMetric::Euclidean => "vector_l2_ops",
        }
    }

    /// SQL expression computing the distance between `column` and bind parameter `param`.
    pub fn distance_expr(self, column: &str, param: &str) -> String {
        format!("({} {} {}::vector)", column, self.operator(), param)
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistanceMetric::Cosine => "COSINE",
            DistanceMetric::DotProduct => "DOT_PRODUCT",
            DistanceMetric::Euclidean => "EUCLIDEAN",
        };
        f.write_str(name)
    }
}
