use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const GEOMETRIC_MARKER: char = 'g';

#[derive(Debug, Error, PartialEq, Clone)]
pub enum LambdaParseError {
    #[error("Lambda path specification is empty")]
    Empty,

    #[error("Lambda range '{entry}' must have exactly three ':'-separated fields (start:count:stop)")]
    MalformedRange { entry: String },

    #[error("Invalid {field} '{value}' in lambda range '{entry}'")]
    InvalidNumber {
        entry: String,
        field: &'static str,
        value: String,
    },

    #[error("Lambda range '{entry}' requests {count} point(s); at least 2 are required")]
    TooFewPoints { entry: String, count: usize },

    #[error("Lambda range '{entry}' runs backwards (start {start} > stop {stop})")]
    Decreasing { entry: String, start: f64, stop: f64 },

    #[error("Geometric lambda range '{entry}' needs a strictly positive start")]
    NonPositiveGeometricStart { entry: String },

    #[error("Lambda value {value} at position {index} does not increase the path")]
    NonMonotonic { index: usize, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Spacing {
    Linear,
    Geometric,
}

#[derive(Debug, Clone, PartialEq)]
struct RangeSpec {
    start: f64,
    stop: f64,
    count: usize,
    spacing: Spacing,
}

impl RangeSpec {
    fn parse(entry: &str) -> Result<Self, LambdaParseError> {
        let fields: Vec<&str> = entry.split(':').map(str::trim).collect();
        let [start_str, count_str, stop_str] = fields.as_slice() else {
            return Err(LambdaParseError::MalformedRange {
                entry: entry.to_string(),
            });
        };

        let number = |field: &'static str, value: &str| -> Result<f64, LambdaParseError> {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| LambdaParseError::InvalidNumber {
                    entry: entry.to_string(),
                    field,
                    value: value.to_string(),
                })
        };

        let start = number("start", *start_str)?;
        let stop = number("stop", *stop_str)?;

        let (count_digits, spacing) = match count_str.strip_suffix(GEOMETRIC_MARKER) {
            Some(digits) => (digits, Spacing::Geometric),
            None => (*count_str, Spacing::Linear),
        };
        let count: usize =
            count_digits
                .parse()
                .map_err(|_| LambdaParseError::InvalidNumber {
                    entry: entry.to_string(),
                    field: "count",
                    value: count_str.to_string(),
                })?;

        if count < 2 {
            return Err(LambdaParseError::TooFewPoints {
                entry: entry.to_string(),
                count,
            });
        }
        if start > stop {
            return Err(LambdaParseError::Decreasing {
                entry: entry.to_string(),
                start,
                stop,
            });
        }
        if spacing == Spacing::Geometric && start <= 0.0 {
            return Err(LambdaParseError::NonPositiveGeometricStart {
                entry: entry.to_string(),
            });
        }

        Ok(Self {
            start,
            stop,
            count,
            spacing,
        })
    }

    fn expand(&self) -> impl Iterator<Item = f64> + '_ {
        let last = self.count - 1;
        (0..self.count).map(move |i| {
            if i == last {
                return self.stop;
            }
            let t = i as f64 / last as f64;
            match self.spacing {
                Spacing::Linear => self.start + (self.stop - self.start) * t,
                Spacing::Geometric => self.start * (self.stop / self.start).powf(t),
            }
        })
    }
}

/// Ordered coupling-parameter values of one decoupling stage.
///
/// Built from a comma-separated list of `start:count:stop` ranges, each expanding to
/// `count` evenly spaced values including both endpoints. Appending `g` to the count
/// (`1e-3:8g:1`) spaces the range geometrically instead. Ranges concatenate in the listed
/// order; when a range starts exactly where the previous one stopped the shared endpoint
/// is kept once. The resulting path must be strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaPath {
    values: Vec<f64>,
}

impl LambdaPath {
    pub fn parse(spec: &str) -> Result<Self, LambdaParseError> {
        if spec.trim().is_empty() {
            return Err(LambdaParseError::Empty);
        }

        let ranges = spec
            .split(',')
            .map(|entry| RangeSpec::parse(entry.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut values: Vec<f64> = Vec::new();
        for range in &ranges {
            let mut points = range.expand().peekable();
            if let (Some(&last), Some(&first)) = (values.last(), points.peek()) {
                if last == first {
                    points.next();
                }
            }
            values.extend(points);
        }

        for (index, pair) in values.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(LambdaParseError::NonMonotonic {
                    index: index + 1,
                    value: pair[1],
                });
            }
        }

        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.values.iter()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }
}

impl FromStr for LambdaPath {
    type Err = LambdaParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'a> IntoIterator for &'a LambdaPath {
    type Item = &'a f64;
    type IntoIter = std::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl fmt::Display for LambdaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| format!("{v}")).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}
