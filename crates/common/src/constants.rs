//! Wire-level names shared by every transport

/// Coordinator address parameter
pub const PARAM_DTM: &str = "dtm";
/// Global transaction id parameter
pub const PARAM_GID: &str = "gid";
/// Branch id parameter
pub const PARAM_BRANCH_ID: &str = "branch_id";
/// Transaction pattern parameter
pub const PARAM_TRANS_TYPE: &str = "trans_type";
/// Branch operation parameter
pub const PARAM_OP: &str = "op";
/// Phase-2 callback address parameter
pub const PARAM_PHASE2_URL: &str = "phase2_url";

/// Prefix applied to every parameter when carried as RPC call metadata
pub const METADATA_PREFIX: &str = "dtm-";
/// Reply metadata key carrying the protocol result on RPC transports
pub const METADATA_RESULT: &str = "dtm-result";

/// JSON-RPC error code signalling FAILURE
pub const JSON_RPC_CODE_FAILURE: i64 = -32901;
/// JSON-RPC error code signalling ONGOING
pub const JSON_RPC_CODE_ONGOING: i64 = -32902;

/// Branch id used for the local transaction of a two-phase message
pub const MSG_BRANCH_ID: &str = "00";
/// Barrier id used for the local transaction of a two-phase message
pub const MSG_BARRIER_ID: &str = "01";

/// Maximum number of sub branches one parent branch may create
pub const MAX_SUB_BRANCHES: u32 = 99;
