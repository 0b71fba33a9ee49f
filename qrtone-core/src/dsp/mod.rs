// QRTone
// Copyright (c) 2025 The Project QRTone Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `dsp` module provides the signal-processing primitives used by the tone analyzers.

pub mod goertzel;
pub mod peak;
pub mod percentile;
pub mod window;
