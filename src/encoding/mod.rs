// Copyright (c) 2025
// This file is licensed under the AGPL-3.0-or-later

// This file includes portions of code from https://github.com/erikgrinaker/toydb (Apache 2 License).
// Original Apache 2 License Copyright (c) erikgrinaker 2024.

//! Binary encodings used by this crate: [`keycode`] for order-preserving
//! key bytes.

pub mod keycode;
