//! Per-IMT coefficient tables.
//!
//! Ground-motion models publish their coefficients as a whitespace table:
//! a header line naming the columns, then one row per IMT. The first
//! column is the IMT itself (`pga`, `pgv`, `mmi`, or a bare number read as
//! an SA period in seconds). Requesting an SA period between two tabulated
//! periods interpolates every coefficient linearly in log-period;
//! requesting a period outside the tabulated range is an out-of-domain
//! error, never an extrapolation.

use std::collections::BTreeMap;

use tremor_core::{HazardError, Imt, Result};

/// A parsed coefficient table, keyed by IMT.
#[derive(Debug, Clone)]
pub struct CoeffsTable {
    names: Vec<String>,
    rows: BTreeMap<Imt, Vec<f64>>,
    // Ascending tabulated SA periods, for interpolation bracketing.
    sa_periods: Vec<f64>,
}

impl CoeffsTable {
    /// Parse a table from its textual form.
    ///
    /// ```text
    /// imt     c1      c2      sigma
    /// pga     1.20   -0.75    0.60
    /// 0.10    1.45   -0.80    0.65
    /// 1.00    0.30   -0.70    0.70
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let header = lines
            .next()
            .ok_or_else(|| HazardError::Config("empty coefficient table".into()))?;
        let mut cols = header.split_whitespace();
        let first = cols.next().unwrap_or_default();
        if !first.eq_ignore_ascii_case("imt") {
            return Err(HazardError::Config(format!(
                "coefficient table header must start with `imt`, got `{first}`"
            )));
        }
        let names: Vec<String> = cols.map(str::to_string).collect();
        if names.is_empty() {
            return Err(HazardError::Config(
                "coefficient table has no coefficient columns".into(),
            ));
        }

        let mut rows = BTreeMap::new();
        for line in lines {
            let mut fields = line.split_whitespace();
            let imt = parse_row_imt(fields.next().unwrap_or_default())?;
            let values: Vec<f64> = fields
                .map(|f| {
                    f.parse::<f64>().map_err(|_| {
                        HazardError::Config(format!("bad coefficient `{f}` in row for {imt}"))
                    })
                })
                .collect::<Result<_>>()?;
            if values.len() != names.len() {
                return Err(HazardError::Config(format!(
                    "row for {imt} has {} values, expected {}",
                    values.len(),
                    names.len()
                )));
            }
            if rows.insert(imt, values).is_some() {
                return Err(HazardError::Config(format!("duplicate row for {imt}")));
            }
        }
        if rows.is_empty() {
            return Err(HazardError::Config("coefficient table has no rows".into()));
        }

        let sa_periods: Vec<f64> = rows
            .keys()
            .filter_map(|imt| match imt {
                Imt::Sa(p) => Some(*p),
                _ => None,
            })
            .collect();
        Ok(Self { names, rows, sa_periods })
    }

    /// Index of a coefficient column, resolved once at model construction.
    pub fn col(&self, name: &str) -> Result<usize> {
        self.names.iter().position(|n| n == name).ok_or_else(|| {
            HazardError::Config(format!("no coefficient column named `{name}`"))
        })
    }

    /// The coefficient row for an IMT.
    ///
    /// Tabulated IMTs are returned as-is. SA periods inside the tabulated
    /// range are interpolated in log-period; anything else is out of
    /// domain for `model`.
    pub fn get(&self, model: &str, imt: &Imt) -> Result<Vec<f64>> {
        if let Some(row) = self.rows.get(imt) {
            return Ok(row.clone());
        }
        let Imt::Sa(period) = imt else {
            return Err(HazardError::UnsupportedImt {
                model: model.to_string(),
                imt: imt.to_string(),
            });
        };
        let bracket = self
            .sa_periods
            .windows(2)
            .find(|w| w[0] < *period && *period < w[1]);
        let Some(&[p0, p1]) = bracket else {
            return Err(HazardError::OutOfDomain {
                model: model.to_string(),
                what: "SA period",
                value: *period,
            });
        };
        let lo = &self.rows[&Imt::sa(p0)];
        let hi = &self.rows[&Imt::sa(p1)];
        let t = (period.ln() - p0.ln()) / (p1.ln() - p0.ln());
        Ok(lo.iter().zip(hi).map(|(a, b)| a + t * (b - a)).collect())
    }

    /// All tabulated SA periods, ascending.
    pub fn sa_periods(&self) -> &[f64] {
        &self.sa_periods
    }
}

fn parse_row_imt(field: &str) -> Result<Imt> {
    if field.eq_ignore_ascii_case("pga") {
        return Ok(Imt::Pga);
    }
    if field.eq_ignore_ascii_case("pgv") {
        return Ok(Imt::Pgv);
    }
    if field.eq_ignore_ascii_case("mmi") {
        return Ok(Imt::Mmi);
    }
    field
        .parse::<f64>()
        .ok()
        .filter(|p| *p > 0.0)
        .map(Imt::sa)
        .ok_or_else(|| HazardError::Config(format!("bad IMT `{field}` in coefficient table")))
}
