//! Per-function error codes reported through `ContextEH` records.
//!
//! Every ABI entry point tags the records it produces with its own code so a
//! caller can tell which call failed from the record alone.

pub const CREATE: u32 = 0x5623_4801;
pub const DESTROY: u32 = 0x2dc1_7586;
pub const CLONE: u32 = 0xf524_16f4;
pub const COPY: u32 = 0x06e0_b1ce;
pub const CLEAR: u32 = 0x06e0_b1ce;

pub const GET_OR_INSERT_BY_KEY: u32 = 0xcb1e_c66f;
pub const GET_BY_KEY: u32 = 0xb2a4_ab43;
pub const GET_BY_INDEX: u32 = 0x6ba9_8764;
pub const CONTAINS: u32 = 0xb2a4_ab44;
pub const ERASE_KEY: u32 = 0xb2a4_ab45;

pub const PUT_STR: u32 = 0xaa60_0d43;
pub const PUT_LONG: u32 = 0x88df_0572;
pub const PUT_UNSIGNED_LONG: u32 = 0x88df_0573;
pub const PUT_DOUBLE: u32 = 0x75a0_49e2;
pub const PUT_BOOL: u32 = 0xccc7_e754;
pub const ALLOC_DATA_PTR: u32 = 0x4655_ae44;
pub const PUT_DATA_PTR: u32 = 0x4c55_1e44;
pub const PUT_CONST_DATA_PTR: u32 = 0x4c55_1e44;

pub const GET_STR: u32 = 0x9097_d24a;
pub const GET_STR_SIZE: u32 = 0x8fc9_1369;
pub const GET_LONG: u32 = 0x2353_ead7;
pub const GET_UNSIGNED_LONG: u32 = 0x2353_ead8;
pub const GET_DOUBLE: u32 = 0xd4fb_d56c;
pub const GET_BOOL: u32 = 0xfe8d_07c6;
pub const GET_DATA_PTR: u32 = 0x5122_8370;
pub const GET_DATA_SIZE: u32 = 0x5122_8371;

pub const GET_LENGTH: u32 = 0xd45f_61aa;
pub const GET_KEYS: u32 = 0xd48f_61aa;
/// `ctx_get_keys` asked for more keys than the object has.
pub const KEYS_LENGTH_EXCEEDED: u32 = 0xdada_331a;

pub const IS_NONE: u32 = 0x96fa_c41a;
pub const IS_ARRAY: u32 = 0x96fa_c41b;
pub const IS_OBJECT: u32 = 0x96fa_c41c;
pub const IS_BOOL: u32 = 0x96fa_c42c;
pub const IS_LONG: u32 = 0x96fa_c43c;
pub const IS_UNSIGNED_LONG: u32 = 0x96fa_c43d;
pub const IS_DOUBLE: u32 = 0x96fa_c44c;
pub const IS_STRING: u32 = 0x96fa_c45c;
pub const IS_DATA_PTR: u32 = 0x96fa_c46c;

pub const PUSH_BACK: u32 = 0x6b8d_124a;

pub const SERIALIZE: u32 = 0x1a5e_0c01;
pub const DESERIALIZE: u32 = 0x1a5e_0c02;

/// Error accessors called with a null record.
pub const ERROR_ACCESS: u32 = 0xe4e0_0001;

pub const SET_SDK_PATH: u32 = 0x10d5_04a1;
pub const BLOCK_CREATE: u32 = 0x10d5_04a0;
pub const BLOCK_PROCESS: u32 = 0x9398_017a;
pub const BLOCK_DESTROY: u32 = 0xfa7b_73ff;
