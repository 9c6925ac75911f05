//! Model constants.
//!
//! These are butteraugli's published tuning values. Changing any of them
//! changes every distance the engine reports.

// ============================================================================
// Opsin dynamics
// ============================================================================

/// Opsin absorbance mixing matrix, row-major, one row per output channel.
pub const OPSIN_ABSORBANCE_MATRIX: [[f32; 3]; 3] = [
    [0.299_565_5, 0.633_730_9, 0.077_705_62],
    [0.221_586_91, 0.693_913_9, 0.098_731_36],
    [0.02, 0.02, 0.204_801_29],
];

/// Per-channel bias added after mixing. Also the floor of each channel.
pub const OPSIN_ABSORBANCE_BIAS: [f32; 3] = [1.755_748_4, 1.755_748_4, 12.226_455];

/// Sigma of the adaptation blur applied before computing sensitivity.
pub const OPSIN_BLUR_SIGMA: f32 = 1.2;

/// Lower bound for pre-mixed values and sensitivities.
pub const OPSIN_MIN_VALUE: f32 = 1e-4;

/// Gamma curve: `GAMMA_MUL * ln(v + GAMMA_BIAS) + GAMMA_ADD`.
pub const GAMMA_MUL: f32 = 19.245_013;
pub const GAMMA_ADD: f32 = -23.160_463;
pub const GAMMA_BIAS: f32 = 9.971_064;

// ============================================================================
// Frequency separation
// ============================================================================

/// Sigma for LF (low frequency) blur.
pub const SIGMA_LF: f64 = 7.15593339443;
/// Sigma for HF (high frequency) blur.
pub const SIGMA_HF: f64 = 3.22489901262;
/// Sigma for UHF (ultra high frequency) blur.
pub const SIGMA_UHF: f64 = 1.56416327805;

/// Range removed around zero for MF-X.
pub const REMOVE_MF_RANGE: f64 = 0.29;
/// Range amplified around zero for MF-Y.
pub const ADD_MF_RANGE: f64 = 0.1;
/// Range removed around zero for HF-X.
pub const REMOVE_HF_RANGE: f64 = 1.5;
/// Range amplified around zero for HF-Y.
pub const ADD_HF_RANGE: f64 = 0.132;
/// Range removed around zero for UHF-X.
pub const REMOVE_UHF_RANGE: f64 = 0.04;

pub const MAXCLAMP_HF: f64 = 28.4691806922;
pub const MAXCLAMP_UHF: f64 = 5.19175294647;
/// Slope applied beyond the clamp point.
pub const MAXCLAMP_MUL: f32 = 0.724_216_146;

pub const MUL_Y_HF: f64 = 2.155;
pub const MUL_Y_UHF: f64 = 2.69313763794;

pub const XMUL_LF_TO_VALS: f64 = 33.832837186260;
pub const YMUL_LF_TO_VALS: f64 = 14.458268100570;
pub const BMUL_LF_TO_VALS: f64 = 49.87984651440;
pub const Y_TO_B_MUL_LF_TO_VALS: f64 = -0.362267051518;

/// X-by-Y suppression in the HF band.
pub const SUPPRESS_XY: f64 = 46.0;
pub const SUPPRESS_S: f64 = 0.653020556257;

// ============================================================================
// Malta filters
// ============================================================================

pub const W_MF_MALTA: f64 = 37.0819870399;
pub const NORM1_MF: f64 = 130_262_059.556;
pub const W_MF_MALTA_X: f64 = 8246.75321353;
pub const NORM1_MF_X: f64 = 1_009_002.70582;

pub const W_HF_MALTA: f64 = 18.7237414387;
pub const NORM1_HF: f64 = 4_498_534.45232;
pub const W_HF_MALTA_X: f64 = 6923.99476109;
pub const NORM1_HF_X: f64 = 8051.15833247;

pub const W_UHF_MALTA: f64 = 1.10039032555;
pub const NORM1_UHF: f64 = 71.7800275169;
pub const W_UHF_MALTA_X: f64 = 173.5;
pub const NORM1_UHF_X: f64 = 5.0;

/// Weight of the symmetric term in the scaled difference.
pub const MALTA_WEIGHT_SYMMETRIC: f64 = 0.5;
/// Weight of the half-open terms in the scaled difference.
pub const MALTA_WEIGHT_ASYMMETRIC: f64 = 0.33;
/// Nominal line length used to normalize filter responses.
pub const MALTA_LEN: f64 = 3.75;
/// Response multiplier for the 9-tap filter.
pub const MALTA_MULLI_HF: f64 = 0.39905817637;
/// Response multiplier for the 5-tap filter.
pub const MALTA_MULLI_LF: f64 = 0.611612573796;

// ============================================================================
// Per-band L2 weights
// ============================================================================

/// `[HF_X, HF_Y, HF_B, MF_X, MF_Y, MF_B, LF_X, LF_Y, LF_B]`
pub const WMUL: [f64; 9] = [
    400.0,
    1.50815703118,
    0.0,
    2150.0,
    10.6195433239,
    16.2176043152,
    29.2353797994,
    0.844626970982,
    0.703646627719,
];

// ============================================================================
// Masking
// ============================================================================

/// Normalization for intensity target: ln(80) / ln(255).
pub const INTENSITY_TARGET_NORMALIZATION: f32 = 0.790_799_17;

/// Scale that maps an internal distance of 17.83 to 1.0.
pub const GLOBAL_SCALE: f32 = 1.0 / (17.83 * INTENSITY_TARGET_NORMALIZATION);

/// `[X, Y-UHF, Y-HF]` multipliers when combining bands for the mask.
pub const COMBINE_CHANNELS_MULS: [f32; 3] = [2.5, 0.4, 0.4];

pub const MASK_MUL: f32 = 6.19424080439;
pub const MASK_BIAS: f32 = 12.61050594197;
pub const MASK_RADIUS: f32 = 2.7;
pub const MASK_TO_ERROR_MUL: f32 = 10.0;

/// Neighbor distance for fuzzy erosion.
pub const EROSION_STEP: usize = 3;
/// Weights of the three smallest neighborhood values.
pub const EROSION_WEIGHTS: [f32; 3] = [0.45, 0.3, 0.25];

pub const MASK_Y_OFFSET: f64 = 0.829591754942;
pub const MASK_Y_SCALER: f64 = 0.451936922203;
pub const MASK_Y_MUL: f64 = 2.5485944793;

pub const MASK_DC_Y_OFFSET: f64 = 0.20025578522;
pub const MASK_DC_Y_SCALER: f64 = 3.87449418804;
pub const MASK_DC_Y_MUL: f64 = 0.505054525019;

// ============================================================================
// Multi-resolution
// ============================================================================

/// Both sides must be at least this large for a half-resolution pass.
pub const MIN_SIZE_FOR_SUBSAMPLE: usize = 15;
/// Weight of the half-resolution map.
pub const SUBSAMPLE_WEIGHT: f32 = 0.5;
/// Fraction of the full-resolution map replaced by the half-resolution one.
pub const SUBSAMPLE_MIXING: f32 = 0.3;

/// Frames smaller than this on either side are padded before comparison.
pub const MIN_FRAME_SIZE: usize = 8;

// ============================================================================
// Interpretation
// ============================================================================

/// Distances below this are generally imperceptible.
pub const BUTTERAUGLI_GOOD: f64 = 1.0;
/// Distances above this show clearly visible differences.
pub const BUTTERAUGLI_BAD: f64 = 2.0;
