//! Lua scripts for atomic renewal store operations.
//!
//! Redis runs each script to completion without interleaving other commands,
//! so a rotation identifier can be redeemed at most once even when two
//! requests race on the same refresh token.

/// Lua script that redeems a rotation identifier.
///
/// Arguments:
/// - KEYS[1]: Renewal key (`renewal:<jti>`)
/// - ARGV[1]: Expected user id (decimal)
///
/// Returns:
/// - 1: Consumed (entry existed, owner matched, entry deleted)
/// - 0: Absent (never issued, already redeemed, revoked or lapsed)
/// - -1: Owner mismatch (entry existed for another user, entry deleted)
pub const CONSUME_RENEWAL: &str = r#"
local stored = redis.call('GET', KEYS[1])

if stored == nil or stored == false then
    return 0
end

-- Single use: the entry is gone whatever the outcome
redis.call('DEL', KEYS[1])

if stored == ARGV[1] then
    return 1
end

return -1
"#;
