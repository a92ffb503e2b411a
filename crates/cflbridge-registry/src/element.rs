// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Complex single-precision element

use bytemuck::{Pod, Zeroable};

/// Interleaved `(re, im)` pair, layout-compatible with C `float complex`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ComplexF32 {
    pub re: f32,
    pub im: f32,
}

/// Size of one element in bytes
pub const ELEMENT_SIZE: usize = std::mem::size_of::<ComplexF32>();

impl ComplexF32 {
    pub const ZERO: ComplexF32 = ComplexF32 { re: 0.0, im: 0.0 };

    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    pub fn norm(&self) -> f32 {
        self.re.hypot(self.im)
    }
}

impl From<f32> for ComplexF32 {
    fn from(re: f32) -> Self {
        Self { re, im: 0.0 }
    }
}
