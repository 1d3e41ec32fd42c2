//! Raw (uncompressed) animation clips.
//!
//! A clip stores one rotation, translation, and scale track per bone of its
//! skeleton, all uniformly sampled at the same rate. Clips are read-only
//! inputs to the compressor.

use crate::compression::skeleton::RigidSkeleton;
use crate::core::error::{Error, Result};
use crate::math::{Quat, Transform, Vec3};

/// How a delta clip combines with its base clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditiveKind {
    /// Full transform multiply: the delta lives in the base pose's space.
    Relative,
    /// Rotation multiplies, translation adds, scale multiplies.
    Additive0,
    /// Rotation multiplies, translation adds, scale combines as
    /// `base * (delta + 1)`.
    Additive1,
}

impl AdditiveKind {
    pub fn name(self) -> &'static str {
        match self {
            AdditiveKind::Relative => "relative",
            AdditiveKind::Additive0 => "additive0",
            AdditiveKind::Additive1 => "additive1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "relative" => Some(AdditiveKind::Relative),
            "additive0" => Some(AdditiveKind::Additive0),
            "additive1" => Some(AdditiveKind::Additive1),
            _ => None,
        }
    }

    /// The neutral scale value for deltas of this kind.
    #[inline]
    pub fn default_scale(self) -> Vec3 {
        match self {
            AdditiveKind::Additive1 => Vec3::zero(),
            _ => Vec3::one(),
        }
    }
}

/// The three sample tracks of one bone.
#[derive(Debug, Clone, Default)]
pub struct BoneTracks {
    pub rotations: Vec<Quat>,
    pub translations: Vec<Vec3>,
    pub scales: Vec<Vec3>,
}

impl BoneTracks {
    /// A track holding `num_samples` copies of the neutral transform.
    pub fn identity(num_samples: usize) -> Self {
        Self {
            rotations: vec![Quat::identity(); num_samples],
            translations: vec![Vec3::zero(); num_samples],
            scales: vec![Vec3::one(); num_samples],
        }
    }

    #[inline]
    pub fn sample(&self, sample_index: usize) -> Transform {
        Transform::new(
            self.rotations[sample_index],
            self.translations[sample_index],
            self.scales[sample_index],
        )
    }
}

/// A uniformly sampled animation clip for one skeleton.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    name: String,
    num_samples: u32,
    sample_rate: u32,
    error_threshold: f64,
    bones: Vec<BoneTracks>,
    additive_base: Option<(AdditiveKind, Box<AnimationClip>)>,
}

impl AnimationClip {
    /// Build a clip, validating shape and numeric sanity against the
    /// skeleton it animates.
    pub fn new(
        skeleton: &RigidSkeleton,
        name: impl Into<String>,
        num_samples: u32,
        sample_rate: u32,
        error_threshold: f64,
        bones: Vec<BoneTracks>,
    ) -> Result<Self> {
        if num_samples == 0 {
            return Err(Error::InvalidInput("clip has no samples".to_owned()));
        }
        if sample_rate == 0 {
            return Err(Error::InvalidInput("clip sample rate is zero".to_owned()));
        }
        if bones.len() != usize::from(skeleton.num_bones()) {
            return Err(Error::InvalidInput(format!(
                "clip has {} bone tracks but the skeleton has {} bones",
                bones.len(),
                skeleton.num_bones()
            )));
        }

        let num_samples_usize = num_samples as usize;
        for (bone_index, tracks) in bones.iter().enumerate() {
            if tracks.rotations.len() != num_samples_usize
                || tracks.translations.len() != num_samples_usize
                || tracks.scales.len() != num_samples_usize
            {
                return Err(Error::InvalidInput(format!(
                    "bone {bone_index} tracks do not all hold {num_samples} samples"
                )));
            }

            for rotation in &tracks.rotations {
                if !rotation.is_finite() {
                    return Err(Error::InvalidInput(format!(
                        "bone {bone_index} has a non-finite rotation sample"
                    )));
                }
                if (rotation.length() - 1.0).abs() > 1.0e-3 {
                    return Err(Error::InvalidInput(format!(
                        "bone {bone_index} has an unnormalized rotation sample (length {})",
                        rotation.length()
                    )));
                }
            }
            if tracks.translations.iter().any(|v| !v.is_finite())
                || tracks.scales.iter().any(|v| !v.is_finite())
            {
                return Err(Error::InvalidInput(format!(
                    "bone {bone_index} has a non-finite vector sample"
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            num_samples,
            sample_rate,
            error_threshold,
            bones,
            additive_base: None,
        })
    }

    /// Attach the base clip this clip is a delta of.
    pub fn set_additive_base(&mut self, kind: AdditiveKind, base: AnimationClip) {
        self.additive_base = Some((kind, Box::new(base)));
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn num_bones(&self) -> u16 {
        self.bones.len() as u16
    }

    #[inline]
    pub fn num_samples(&self) -> u32 {
        self.num_samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn error_threshold(&self) -> f64 {
        self.error_threshold
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        f64::from(self.num_samples - 1) / f64::from(self.sample_rate)
    }

    #[inline]
    pub fn bones(&self) -> &[BoneTracks] {
        &self.bones
    }

    #[inline]
    pub fn bone(&self, bone_index: u16) -> &BoneTracks {
        &self.bones[usize::from(bone_index)]
    }

    #[inline]
    pub fn additive_base(&self) -> Option<(AdditiveKind, &AnimationClip)> {
        self.additive_base
            .as_ref()
            .map(|(kind, base)| (*kind, base.as_ref()))
    }

    /// Uncompressed size in bytes: every sample stored as f32 components
    /// (4 for rotations, 3 each for translations and scales).
    pub fn raw_size(&self) -> u32 {
        u32::from(self.num_bones()) * self.num_samples * ((4 + 3 + 3) * 4)
    }

    /// Sample the whole pose at `sample_time` seconds, linearly blending
    /// between the two adjacent keys.
    pub fn sample_pose(&self, sample_time: f64, out_local_pose: &mut [Transform]) {
        debug_assert_eq!(out_local_pose.len(), self.bones.len());

        let clamped = sample_time.clamp(0.0, self.duration());
        let frame = clamped * f64::from(self.sample_rate);
        let key0 = (frame.floor() as u32).min(self.num_samples - 1) as usize;
        let key1 = (key0 + 1).min(self.num_samples as usize - 1);
        let alpha = frame - frame.floor();

        for (tracks, out) in self.bones.iter().zip(out_local_pose.iter_mut()) {
            *out = Transform::new(
                Quat::lerp(tracks.rotations[key0], tracks.rotations[key1], alpha),
                tracks.translations[key0].lerp(tracks.translations[key1], alpha),
                tracks.scales[key0].lerp(tracks.scales[key1], alpha),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::skeleton::RigidBone;

    fn one_bone_skeleton() -> RigidSkeleton {
        RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap()
    }

    #[test]
    fn rejects_shape_mismatches() {
        let skeleton = one_bone_skeleton();

        assert!(AnimationClip::new(&skeleton, "empty", 0, 30, 0.01, vec![]).is_err());

        let short = BoneTracks {
            rotations: vec![Quat::identity(); 3],
            translations: vec![Vec3::zero(); 2],
            scales: vec![Vec3::one(); 3],
        };
        assert!(AnimationClip::new(&skeleton, "short", 3, 30, 0.01, vec![short]).is_err());
    }

    #[test]
    fn rejects_unnormalized_rotations() {
        let skeleton = one_bone_skeleton();
        let mut tracks = BoneTracks::identity(2);
        tracks.rotations[1] = Quat::new(0.0, 0.0, 0.0, 2.0);
        let err = AnimationClip::new(&skeleton, "bad", 2, 30, 0.01, vec![tracks]).unwrap_err();
        assert_eq!(err.name(), "InvalidInput");
    }

    #[test]
    fn duration_and_sampling() {
        let skeleton = one_bone_skeleton();
        let mut tracks = BoneTracks::identity(31);
        for (sample_index, translation) in tracks.translations.iter_mut().enumerate() {
            *translation = Vec3::new(sample_index as f64, 0.0, 0.0);
        }
        let clip = AnimationClip::new(&skeleton, "walk", 31, 30, 0.01, vec![tracks]).unwrap();

        assert_eq!(clip.duration(), 1.0);

        let mut pose = [Transform::identity()];
        // Halfway between samples 15 and 16.
        clip.sample_pose(15.5 / 30.0, &mut pose);
        assert!((pose[0].translation.x - 15.5).abs() < 1.0e-9);

        // Clamped past the end.
        clip.sample_pose(10.0, &mut pose);
        assert!((pose[0].translation.x - 30.0).abs() < 1.0e-9);
    }
}
