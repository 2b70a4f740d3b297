use std::collections::HashSet;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lab record supplied by the lab repository. Never mutated by the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabAsset {
    pub id: String,
    pub name: String,
    pub blurb: String,
    pub model_path: String,
    pub thumbnail_url: Option<String>,
}

/// Raw placement coordinates. Any axis may be missing in the source data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementPosition {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
}

/// Item record as supplied by the item repository, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemPlacement {
    pub item_id: String,
    pub model_path: Option<String>,
    pub position: PlacementPosition,
    /// Euler XYZ, radians.
    pub rotation: Option<[f32; 3]>,
    pub scale: Option<f32>,
    pub lab_id: String,
}

/// Why a placement was excluded from composition.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PlacementDefect {
    #[error("missing model path")]
    MissingModelPath,
    #[error("missing {0} coordinate")]
    MissingCoordinate(char),
    #[error("non-finite {0} coordinate")]
    NonFiniteCoordinate(char),
    #[error("scale must be positive, got {0}")]
    InvalidScale(f32),
    #[error("duplicate item id")]
    DuplicateItemId,
}

/// Non-fatal signal that an item was left out of the scene.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("item {item_id} skipped: {defect}")]
pub struct InvalidPlacementWarning {
    pub item_id: String,
    pub defect: PlacementDefect,
}

/// Placement that passed validation, with its world transform resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPlacement {
    pub item_id: String,
    pub model_path: String,
    pub transform: Transform,
}

impl ItemPlacement {
    /// Check the placement and resolve its transform.
    pub fn validate(&self) -> Result<ValidPlacement, InvalidPlacementWarning> {
        let warn = |defect| InvalidPlacementWarning {
            item_id: self.item_id.clone(),
            defect,
        };

        let model_path = self
            .model_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| warn(PlacementDefect::MissingModelPath))?;

        let axis = |value: Option<f32>, name: char| -> Result<f32, InvalidPlacementWarning> {
            let v = value.ok_or_else(|| warn(PlacementDefect::MissingCoordinate(name)))?;
            if v.is_finite() {
                Ok(v)
            } else {
                Err(warn(PlacementDefect::NonFiniteCoordinate(name)))
            }
        };
        let translation = Vec3::new(
            axis(self.position.x, 'x')?,
            axis(self.position.y, 'y')?,
            axis(self.position.z, 'z')?,
        );

        let scale = self.scale.unwrap_or(1.0);
        if !(scale.is_finite() && scale > 0.0) {
            return Err(warn(PlacementDefect::InvalidScale(scale)));
        }

        let [rx, ry, rz] = self.rotation.unwrap_or([0.0; 3]);
        let transform = Transform {
            translation,
            rotation: Quat::from_euler(EulerRot::XYZ, rx, ry, rz),
            scale: Vec3::splat(scale),
        };

        Ok(ValidPlacement {
            item_id: self.item_id.clone(),
            model_path: model_path.to_string(),
            transform,
        })
    }
}

/// Placements for one lab, validated once when the lab is selected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementSet {
    /// Unique by `item_id`, in source order.
    pub items: Vec<ValidPlacement>,
    pub warnings: Vec<InvalidPlacementWarning>,
}

/// Split placements into valid ones and the warnings for the rest. A repeated
/// item id keeps its first valid placement; later ones become warnings.
pub fn partition_placements(placements: &[ItemPlacement]) -> PlacementSet {
    let mut set = PlacementSet {
        items: Vec::with_capacity(placements.len()),
        warnings: Vec::new(),
    };
    let mut seen = HashSet::new();

    for placement in placements {
        match placement.validate() {
            Ok(v) if seen.insert(v.item_id.clone()) => set.items.push(v),
            Ok(v) => set.warnings.push(InvalidPlacementWarning {
                item_id: v.item_id,
                defect: PlacementDefect::DuplicateItemId,
            }),
            Err(w) => set.warnings.push(w),
        }
    }
    set
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn resolves_transform_from_fields() {
        let mut p = at("printer", "models/printer.glb", 1.0, 0.0, -2.0);
        p.rotation = Some([0.0, std::f32::consts::FRAC_PI_2, 0.0]);
        p.scale = Some(2.0);

        let v = p.validate().unwrap();
        assert_eq!(v.transform.translation, Vec3::new(1.0, 0.0, -2.0));
        assert_eq!(v.transform.scale, Vec3::splat(2.0));
        let rotated = v.transform.rotation * Vec3::X;
        assert!((rotated - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn missing_fields_are_reported() {
        let no_path = placement("a", None, [Some(0.0); 3]);
        assert_eq!(
            no_path.validate().unwrap_err().defect,
            PlacementDefect::MissingModelPath
        );

        let blank_path = placement("b", Some("  "), [Some(0.0); 3]);
        assert_eq!(
            blank_path.validate().unwrap_err().defect,
            PlacementDefect::MissingModelPath
        );

        let no_y = placement("c", Some("m.glb"), [Some(0.0), None, Some(0.0)]);
        assert_eq!(
            no_y.validate().unwrap_err().defect,
            PlacementDefect::MissingCoordinate('y')
        );
    }

    #[test]
    fn rejects_non_positive_scale() {
        let mut p = at("a", "m.glb", 0.0, 0.0, 0.0);
        p.scale = Some(0.0);
        assert!(matches!(
            p.validate().unwrap_err().defect,
            PlacementDefect::InvalidScale(_)
        ));
    }

    #[test]
    fn partition_counts_match() {
        let placements = vec![
            at("a", "a.glb", 0.0, 0.0, 0.0),
            placement("b", None, [Some(0.0); 3]),
            at("c", "c.glb", 1.0, 1.0, 1.0),
            placement("d", Some("d.glb"), [None, None, None]),
        ];
        let set = partition_placements(&placements);
        assert_eq!(set.items.len(), 2);
        assert_eq!(set.warnings.len(), 2);
        assert_eq!(set.warnings[0].item_id, "b");
    }

    #[test]
    fn duplicate_ids_warn_and_first_wins() {
        let placements = vec![
            placement("scope", None, [Some(0.0); 3]),
            at("scope", "first.glb", 0.0, 0.0, 0.0),
            at("bench", "bench.glb", 1.0, 0.0, 0.0),
            at("scope", "second.glb", 2.0, 0.0, 0.0),
        ];
        let set = partition_placements(&placements);

        // Every input is accounted for as either an item or a warning.
        assert_eq!(set.items.len() + set.warnings.len(), placements.len());
        assert_eq!(set.items[0].model_path, "first.glb");
        assert_eq!(set.items[1].item_id, "bench");
        assert_eq!(
            set.warnings[1],
            InvalidPlacementWarning {
                item_id: "scope".into(),
                defect: PlacementDefect::DuplicateItemId,
            }
        );
        assert_eq!(set.warnings[1].to_string(), "item scope skipped: duplicate item id");
    }
}
