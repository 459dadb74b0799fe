//! Schema derivation from the active model set.
//!
//! The context schema is the union of every model's required parameter
//! sets, computed once at `ContextMaker` construction and pinned for the
//! whole calculation. Whether a site collection can satisfy the schema is
//! checked here, up front: a missing site parameter is a configuration
//! error, never a per-rupture condition.

use std::sync::Arc;

use tremor_core::{CtxSchema, HazardError, Result};
use tremor_gmm::GroundMotionModel;
use tremor_source::site::SiteCollection;

/// The union schema of all models' requirements.
pub fn derive(models: &[Box<dyn GroundMotionModel>]) -> Arc<CtxSchema> {
    let rup = models
        .iter()
        .flat_map(|m| m.caps().requires_rup.iter().copied());
    let site = models
        .iter()
        .flat_map(|m| m.caps().requires_site.iter().copied());
    let dist = models
        .iter()
        .flat_map(|m| m.caps().requires_dist.iter().copied());
    Arc::new(CtxSchema::from_unions(rup, site, dist))
}

/// Verify the site collection provides every site parameter the schema
/// names.
pub fn check_site_params(schema: &CtxSchema, sites: &SiteCollection) -> Result<()> {
    for p in &schema.site {
        if !sites.has_param(*p) {
            return Err(HazardError::Config(format!(
                "site collection does not provide `{p}`, required by the active models"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::BTreeMap;
    use tremor_core::{DistanceKind, SiteParam};
    use tremor_gmm::models::fixed::{FixedDistribution, FixedDistributionSpec, FixedEntry};
    use tremor_gmm::{CrustalBackbone, SiteAmplification};
    use tremor_source::site::Site;

    fn fixed() -> Box<dyn GroundMotionModel> {
        let mut entries = BTreeMap::new();
        let _ = entries.insert(
            tremor_core::Imt::Pga,
            FixedEntry { median: 0.1, sigma: 0.5 },
        );
        Box::new(
            FixedDistribution::new(FixedDistributionSpec {
                name: "f".into(),
                trt: "Active Shallow Crust".into(),
                entries,
            })
            .unwrap(),
        )
    }

    #[test]
    fn union_covers_every_model() {
        let backbone: Box<dyn GroundMotionModel> = Box::new(CrustalBackbone::new().unwrap());
        let amplified: Box<dyn GroundMotionModel> =
            Box::new(SiteAmplification::new(fixed(), -0.3, 0.0).unwrap());
        let schema = derive(&[backbone, amplified]);
        assert!(schema.site.contains(&SiteParam::Vs30));
        assert!(schema.dist.contains(&DistanceKind::Rrup));
    }

    #[test]
    fn missing_site_param_is_fatal() {
        let schema = CtxSchema::from_unions(
            Vec::<tremor_core::RupParam>::new(),
            [SiteParam::Vs30, SiteParam::Z1pt0],
            Vec::<DistanceKind>::new(),
        );
        let sites = SiteCollection::new(&[Site::rock(0.0, 0.0)]).unwrap();
        let err = check_site_params(&schema, &sites).unwrap_err();
        assert_matches!(err, HazardError::Config(msg) if msg.contains("z1pt0"));

        let mut site = Site::rock(0.0, 0.0);
        site.z1pt0 = Some(0.5);
        let sites = SiteCollection::new(&[site]).unwrap();
        check_site_params(&schema, &sites).unwrap();
    }
}
