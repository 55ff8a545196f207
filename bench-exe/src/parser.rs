//  PARSER.rs
//    by Lut99
//
//  Created:
//    21 Feb 2023, 15:20:48
//  Last edited:
//    24 Feb 2023, 09:13:26
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements a [`MetricsParser`] that is driven by a single regular
//!   expression with named capture groups.
//

use regex::Regex;

use specifications::metrics::{Metric, MetricRelativity};

use crate::errors::{MetricsError, ProfileError};
use crate::spec::MetricsParser;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "Run started\nOps/sec: 81234.5 ops\nLatency: 0.82 ms\nhits 12\nDone\n";

    #[test]
    fn parser_extracts_all_matches() {
        let parser: RegexMetricsParser = RegexMetricsParser::new(r"(?m)^(?P<name>[\w/]+): (?P<value>[0-9.]+) (?P<unit>\w+)$").unwrap();
        let metrics: Vec<Metric> = parser.parse(OUTPUT).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].name, "Ops/sec");
        assert_eq!(metrics[0].value, 81234.5);
        assert_eq!(metrics[0].unit.as_deref(), Some("ops"));
        assert_eq!(metrics[1].name, "Latency");
        assert_eq!(metrics[1].relativity, MetricRelativity::Undefined);
    }

    #[test]
    fn parser_unit_is_optional() {
        let parser: RegexMetricsParser = RegexMetricsParser::new(r"(?P<name>hits) (?P<value>\d+)").unwrap();
        let metrics: Vec<Metric> = parser.parse(OUTPUT).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].unit, None);
    }

    #[test]
    fn parser_errors() {
        assert!(matches!(RegexMetricsParser::new(r"(?P<value>\d+)"), Err(ProfileError::MissingMetricsGroup{ group: "name", .. })));
        assert!(matches!(RegexMetricsParser::new(r"(?P<name>\w+)"), Err(ProfileError::MissingMetricsGroup{ group: "value", .. })));

        let parser: RegexMetricsParser = RegexMetricsParser::new(r"(?P<name>throughput)=(?P<value>\S+)").unwrap();
        assert!(matches!(parser.parse(OUTPUT), Err(MetricsError::NoMatches{ .. })));
        assert!(matches!(parser.parse("throughput=fast"), Err(MetricsError::IllegalValue{ .. })));
    }
}





/***** LIBRARY *****/
/// Extracts metrics from every match of a regular expression.
///
/// The expression must have the named groups `name` and `value`, and may have a `unit` group.
#[derive(Clone, Debug)]
pub struct RegexMetricsParser {
    /// The compiled expression.
    regex : Regex,
}

impl RegexMetricsParser {
    /// Constructor for the RegexMetricsParser.
    ///
    /// # Errors
    /// This function errors if the pattern is not a valid expression or lacks a required group.
    pub fn new(pattern: impl AsRef<str>) -> Result<Self, ProfileError> {
        let pattern: &str = pattern.as_ref();
        let regex: Regex = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(err)  => { return Err(ProfileError::IllegalMetricsPattern{ pattern: pattern.into(), err }); },
        };
        for group in [ "name", "value" ] {
            if !regex.capture_names().flatten().any(|n| n == group) {
                return Err(ProfileError::MissingMetricsGroup{ pattern: pattern.into(), group });
            }
        }
        Ok(Self { regex })
    }
}

impl MetricsParser for RegexMetricsParser {
    fn parse(&self, raw: &str) -> Result<Vec<Metric>, MetricsError> {
        let mut metrics: Vec<Metric> = vec![];
        for caps in self.regex.captures_iter(raw) {
            let name: &str = caps.name("name").map(|m| m.as_str()).unwrap_or("");
            let value: &str = caps.name("value").map(|m| m.as_str().trim()).unwrap_or("");
            let value: f64 = match value.parse() {
                Ok(value) => value,
                Err(err)  => { return Err(MetricsError::IllegalValue{ name: name.into(), raw: value.into(), err }); },
            };
            metrics.push(Metric {
                name       : name.into(),
                value,
                unit       : caps.name("unit").map(|m| m.as_str().to_string()).filter(|u| !u.is_empty()),
                relativity : MetricRelativity::Undefined,
            });
        }
        if metrics.is_empty() { return Err(MetricsError::NoMatches{ pattern: self.regex.as_str().into() }); }
        Ok(metrics)
    }
}
