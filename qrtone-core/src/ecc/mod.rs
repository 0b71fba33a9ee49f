// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `ecc` module provides Reed-Solomon forward error correction over GF(2^m).

mod decoder;
mod encoder;
mod galois;

pub use decoder::decode;
pub use encoder::ReedSolomonEncoder;
pub use galois::{GaloisField, GfPoly};
