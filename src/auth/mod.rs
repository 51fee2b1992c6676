// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Mobile number and OTP login for the interview console.
//!
//! ## Auth Flow
//!
//! 1. `request_otp`: backend sends an OTP to the mobile number
//! 2. `issue_temporary_token`: `Authorization: Basic base64(mobile:otp)`
//!    yields a temporary token
//! 3. `validate_otp`: the credential is posted encrypted with
//!    `Authorization: Bearer <temporary token>`
//! 4. On `status == 0` the token endpoint is called again; that token is
//!    final and is stored together with the returned user record
//!
//! ## Security
//!
//! - The temporary token authorizes only the validation call
//! - OTPs and tokens are redacted from `Debug` output and never logged
//! - A failed validation never leaves a partial session behind

pub mod error;
pub mod otp;
pub mod session;
pub mod token;

pub use error::AuthError;
pub use otp::{extract_access_token, issue_token, AuthState, OtpLogin};
pub use session::{Session, UserInfo};
pub use token::{Credential, Token, TokenKind};
