//! Sites and site collections.
//!
//! A [`SiteCollection`] is the struct-of-arrays form consumed by the context
//! builder. Optional parameters (basin depths, backarc flag) stay optional
//! at the collection level: whether they are *required* depends on which
//! ground-motion models are active, and that check happens once at
//! `ContextMaker` setup, not per rupture.

use serde::{Deserialize, Serialize};
use tremor_core::{HazardError, Result, SiteParam};

/// One observation site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Time-averaged shear-wave velocity in the top 30 m, m/s.
    pub vs30: f64,
    /// Whether vs30 was measured rather than inferred.
    pub vs30measured: bool,
    /// Depth to the 1.0 km/s horizon, km.
    pub z1pt0: Option<f64>,
    /// Depth to the 2.5 km/s horizon, km.
    pub z2pt5: Option<f64>,
    /// Whether the site is in the backarc.
    pub backarc: Option<bool>,
}

impl Site {
    /// A rock site (vs30 = 760 m/s) at the given coordinates, with no
    /// optional parameters.
    pub fn rock(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            vs30: 760.0,
            vs30measured: false,
            z1pt0: None,
            z2pt5: None,
            backarc: None,
        }
    }
}

/// A collection of sites in struct-of-arrays layout.
///
/// Site ids (`sids`) index into the *original* collection and survive
/// filtering, so probability maps keyed by sid stay consistent across
/// filtered views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteCollection {
    /// Site ids (stable across filtering).
    pub sids: Vec<u32>,
    /// Longitudes, degrees.
    pub lon: Vec<f64>,
    /// Latitudes, degrees.
    pub lat: Vec<f64>,
    /// vs30 values, m/s.
    pub vs30: Vec<f64>,
    /// vs30measured flags as 0/1.
    pub vs30measured: Vec<f64>,
    /// z1pt0 values, km; present only if every site defines one.
    pub z1pt0: Option<Vec<f64>>,
    /// z2pt5 values, km; present only if every site defines one.
    pub z2pt5: Option<Vec<f64>>,
    /// backarc flags as 0/1; present only if every site defines one.
    pub backarc: Option<Vec<f64>>,
}

impl SiteCollection {
    /// Build from a list of sites, assigning sequential sids. An optional
    /// column is materialized only when every site provides a value.
    pub fn new(sites: &[Site]) -> Result<Self> {
        if sites.is_empty() {
            return Err(HazardError::Config("empty site collection".into()));
        }
        let all =
            |f: &dyn Fn(&Site) -> Option<f64>| -> Option<Vec<f64>> { sites.iter().map(f).collect() };
        Ok(Self {
            sids: (0..sites.len() as u32).collect(),
            lon: sites.iter().map(|s| s.lon).collect(),
            lat: sites.iter().map(|s| s.lat).collect(),
            vs30: sites.iter().map(|s| s.vs30).collect(),
            vs30measured: sites.iter().map(|s| f64::from(u8::from(s.vs30measured))).collect(),
            z1pt0: all(&|s| s.z1pt0),
            z2pt5: all(&|s| s.z2pt5),
            backarc: all(&|s| s.backarc.map(|b| f64::from(u8::from(b)))),
        })
    }

    /// Number of sites.
    pub fn len(&self) -> usize {
        self.sids.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.sids.is_empty()
    }

    /// Whether the given parameter is available for every site.
    pub fn has_param(&self, p: SiteParam) -> bool {
        match p {
            SiteParam::Z1pt0 => self.z1pt0.is_some(),
            SiteParam::Z2pt5 => self.z2pt5.is_some(),
            SiteParam::Backarc => self.backarc.is_some(),
            _ => true,
        }
    }

    /// The column for a site parameter. Missing optional columns are a
    /// configuration-class error: the schema check at setup time should
    /// have rejected the combination already.
    pub fn param(&self, p: SiteParam) -> Result<&[f64]> {
        let missing = || HazardError::MissingParam {
            kind: "site",
            name: p.to_string(),
        };
        match p {
            SiteParam::Vs30 => Ok(&self.vs30),
            SiteParam::Vs30Measured => Ok(&self.vs30measured),
            SiteParam::Lon => Ok(&self.lon),
            SiteParam::Lat => Ok(&self.lat),
            SiteParam::Z1pt0 => self.z1pt0.as_deref().ok_or_else(missing),
            SiteParam::Z2pt5 => self.z2pt5.as_deref().ok_or_else(missing),
            SiteParam::Backarc => self.backarc.as_deref().ok_or_else(missing),
        }
    }

    /// A filtered copy keeping the rows at `indices`, preserving sids.
    pub fn take(&self, indices: &[usize]) -> Self {
        let pick = |v: &[f64]| indices.iter().map(|i| v[*i]).collect::<Vec<_>>();
        Self {
            sids: indices.iter().map(|i| self.sids[*i]).collect(),
            lon: pick(&self.lon),
            lat: pick(&self.lat),
            vs30: pick(&self.vs30),
            vs30measured: pick(&self.vs30measured),
            z1pt0: self.z1pt0.as_deref().map(pick),
            z2pt5: self.z2pt5.as_deref().map(pick),
            backarc: self.backarc.as_deref().map(pick),
        }
    }
}
