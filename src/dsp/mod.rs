//! DSP Primitives
//!
//! Sample-level building blocks shared by the loop strategies: zero-crossing
//! search, crossfades and fades, spectral similarity, phase alignment,
//! slice-and-blend, and silence pruning.

pub mod blend;
pub mod crossfade;
pub mod phase;
pub mod silence;
pub mod similarity;
pub mod zero_crossing;

pub use blend::{slice_and_blend, snap_to_onsets, BlendSettings, BlendedLoop};
pub use crossfade::{
    crossfade, crossfade_curves, crossfade_in_place, crossfade_join, fade_in, fade_in_in_place,
    fade_out, fade_out_in_place, loop_crossfade_in_place, CurveShape, FadeLevels,
};
pub use phase::phase_align_in_place;
pub use silence::{SilencePruner, SilenceSettings};
pub use similarity::{find_similar_endpoints, pearson, similarity_geometry, spectral_similarity};
pub use zero_crossing::nearest_zero_crossing;
