//! Portable f32 math shims.
//!
//! Mirrors the `std`/`libm` split the reference motion crate uses: host
//! builds get the standard library's transcendental functions, `no_std`
//! targets pull the same operations from `libm`.

#[cfg(feature = "std")]
pub fn sqrtf(x: f32) -> f32 {
    x.sqrt()
}
#[cfg(not(feature = "std"))]
pub fn sqrtf(x: f32) -> f32 {
    libm::sqrtf(x)
}

#[cfg(feature = "std")]
pub fn atan2f(y: f32, x: f32) -> f32 {
    y.atan2(x)
}
#[cfg(not(feature = "std"))]
pub fn atan2f(y: f32, x: f32) -> f32 {
    libm::atan2f(y, x)
}

#[cfg(feature = "std")]
pub fn cosf(x: f32) -> f32 {
    x.cos()
}
#[cfg(not(feature = "std"))]
pub fn cosf(x: f32) -> f32 {
    libm::cosf(x)
}

#[cfg(feature = "std")]
pub fn fabsf(x: f32) -> f32 {
    x.abs()
}
#[cfg(not(feature = "std"))]
pub fn fabsf(x: f32) -> f32 {
    libm::fabsf(x)
}

#[cfg(feature = "std")]
pub fn floorf(x: f32) -> f32 {
    x.floor()
}
#[cfg(not(feature = "std"))]
pub fn floorf(x: f32) -> f32 {
    libm::floorf(x)
}
