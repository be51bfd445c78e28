//! Lua scripts for atomic session store operations.
//!
//! Each script runs as one Redis transaction:
//! - `CREATE_SESSION` claims the pair or room-name index and inserts the session
//! - `CONDITIONAL_UPDATE` compares version and status before writing, and
//!   releases the index when the session becomes terminal
//! - `ADD_PARTICIPANT` opens a membership only while the room has a free seat
//!
//! Session hashes hold three fields: `data` (session JSON), `version` and
//! `status`. The last two are duplicated out of the JSON so scripts can
//! compare them without decoding.

/// Lua script that inserts a session and claims its index.
///
/// Arguments:
/// - KEYS[1]: Session key (e.g., `session:{id}`)
/// - KEYS[2]: Optional index key (`pair:{lo}:{hi}:active` or `room:{name}:active`)
/// - ARGV[1]: Session ID
/// - ARGV[2]: Session JSON
/// - ARGV[3]: Version
/// - ARGV[4]: Status
/// - ARGV[5]: Session key prefix used to resolve the current index holder
///
/// Returns:
/// - 1: Created
/// - 0: Index held by a non-terminal session
/// - -1: Session ID already exists
pub const CREATE_SESSION: &str = r#"
local live = { pending = true, ringing = true, active = true }

if redis.call('EXISTS', KEYS[1]) == 1 then
    return -1
end

if #KEYS >= 2 then
    local holder = redis.call('GET', KEYS[2])
    if holder then
        local holder_status = redis.call('HGET', ARGV[5] .. holder, 'status')
        if holder_status and live[holder_status] then
            return 0
        end
    end
    redis.call('SET', KEYS[2], ARGV[1])
end

redis.call('HSET', KEYS[1], 'data', ARGV[2], 'version', ARGV[3], 'status', ARGV[4])
return 1
"#;

/// Lua script for version compare-and-set on a session.
///
/// Arguments:
/// - KEYS[1]: Session key
/// - KEYS[2]: Optional index key to release
/// - ARGV[1]: Expected version
/// - ARGV[2]: Expected status
/// - ARGV[3]: New session JSON
/// - ARGV[4]: New version
/// - ARGV[5]: New status
/// - ARGV[6]: "1" when the new status is terminal
/// - ARGV[7]: Session ID (index is only released if this session holds it)
///
/// Returns:
/// - 1: Updated
/// - 0: Conflict (stale version or status)
/// - -1: Session not found
pub const CONDITIONAL_UPDATE: &str = r#"
local current = redis.call('HMGET', KEYS[1], 'version', 'status')

if not current[1] then
    return -1
end

if current[1] ~= ARGV[1] or current[2] ~= ARGV[2] then
    return 0
end

redis.call('HSET', KEYS[1], 'data', ARGV[3], 'version', ARGV[4], 'status', ARGV[5])

if ARGV[6] == '1' and #KEYS >= 2 then
    if redis.call('GET', KEYS[2]) == ARGV[7] then
        redis.call('DEL', KEYS[2])
    end
end

return 1
"#;

/// Lua script that opens a membership record if the room has capacity.
///
/// The seat count comes from the stored records, never from an instance's cache.
///
/// Arguments:
/// - KEYS[1]: Participants key (`session:{id}:participants`)
/// - KEYS[2]: Session key
/// - ARGV[1]: User ID
/// - ARGV[2]: Participant JSON
/// - ARGV[3]: Capacity
///
/// Returns:
/// - 1: Admitted (or the user already held an open record)
/// - 0: Room full
/// - -1: Session not found
/// - -2: Session is terminal
pub const ADD_PARTICIPANT: &str = r#"
local live = { pending = true, ringing = true, active = true }

local status = redis.call('HGET', KEYS[2], 'status')
if not status then
    return -1
end
if not live[status] then
    return -2
end

local capacity = tonumber(ARGV[3])
local records = redis.call('HGETALL', KEYS[1])
local open = 0

for i = 1, #records, 2 do
    local record = cjson.decode(records[i + 1])
    if record.left_at == nil or record.left_at == cjson.null then
        if records[i] == ARGV[1] then
            return 1
        end
        open = open + 1
    end
end

if open >= capacity then
    return 0
end

redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
return 1
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_refuses_existing_session() {
        assert!(CREATE_SESSION.contains("if redis.call('EXISTS', KEYS[1]) == 1 then"));
        assert!(CREATE_SESSION.contains("return -1"));
    }

    #[test]
    fn test_create_only_yields_to_live_holders() {
        // A stale index pointing at a terminal session must not block creation
        assert!(CREATE_SESSION.contains("live = { pending = true, ringing = true, active = true }"));
        assert!(CREATE_SESSION.contains("if holder_status and live[holder_status] then"));
    }

    #[test]
    fn test_update_compares_version_and_status() {
        assert!(CONDITIONAL_UPDATE.contains("current[1] ~= ARGV[1] or current[2] ~= ARGV[2]"));
    }

    #[test]
    fn test_update_releases_only_own_index() {
        assert!(CONDITIONAL_UPDATE.contains("if redis.call('GET', KEYS[2]) == ARGV[7] then"));
    }

    #[test]
    fn test_add_participant_counts_open_records_only() {
        assert!(ADD_PARTICIPANT.contains("record.left_at == nil or record.left_at == cjson.null"));
        assert!(ADD_PARTICIPANT.contains("if open >= capacity then"));
    }

    #[test]
    fn test_add_participant_refuses_terminal_sessions() {
        assert!(ADD_PARTICIPANT.contains("if not live[status] then\n    return -2"));
    }

    #[test]
    fn test_add_participant_is_idempotent_for_open_member() {
        // A repeat admit for an open member must not count against the seat limit
        assert!(ADD_PARTICIPANT.contains("if records[i] == ARGV[1] then\n            return 1"));
    }

    #[test]
    fn test_scripts_write_all_three_fields() {
        for script in [CREATE_SESSION, CONDITIONAL_UPDATE] {
            assert!(script.contains("'data'"));
            assert!(script.contains("'version'"));
            assert!(script.contains("'status'"));
        }
    }
}
