//  METRICS.rs
//    by Lut99
//
//  Created:
//    08 Feb 2023, 14:55:20
//  Last edited:
//    08 Feb 2023, 15:10:43
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the metrics that are extracted from workload output.
//

use std::fmt::{Display, Formatter, Result as FResult};

use serde::{Deserialize, Serialize};


/***** LIBRARY *****/
/// Describes how a metric should be read.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum MetricRelativity {
    HigherIsBetter,
    LowerIsBetter,
    #[default]
    Undefined,
}

/// A single measurement extracted from the output of a workload.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Metric {
    /// The name of the metric (e.g., `throughput`).
    pub name       : String,
    /// The measured value.
    pub value      : f64,
    /// The unit of the value, if any (e.g., `Mbps`).
    #[serde(default)]
    pub unit       : Option<String>,
    /// Whether higher or lower is better.
    #[serde(default)]
    pub relativity : MetricRelativity,
}

impl Display for Metric {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{} = {}", self.name, self.value)?;
        if let Some(unit) = &self.unit { write!(f, " {}", unit)?; }
        Ok(())
    }
}
