// agentd - Library Root
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// All modules exported here for use by the binary and tests.

pub mod paths;
pub mod config;
pub mod logging;
pub mod storage;

// ============================================================================
// COMMAND LAYER
// ============================================================================

/// Flag registration and parsing
pub mod flags;

/// Command trait and the driver that maps outcomes to exit codes
pub mod cmd;

/// Commands grouped under one program name
pub mod supercommand;

// ============================================================================
// HOOK TOOL IPC
// ============================================================================

pub mod wire;
pub mod registry;
pub mod server;
pub mod client;

// ============================================================================
// ROLES
// ============================================================================

pub mod agent;
pub mod bootstrap;
pub mod dispatch;
