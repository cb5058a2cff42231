//! Well-known identifiers emitted by the instrumented firmware.

use crate::names::{NameError, NameRegistry};

pub const MON_CT_CONTROL: u16 = 0;
pub const MON_CT_SCHED: u16 = 1;
pub const MON_CT_NETIN: u16 = 2;
pub const MON_CT_NETOUT: u16 = 3;
pub const MON_CT_CPU: u16 = 4;
pub const MON_CT_RADIO: u16 = 5;
pub const MON_CT_POWERCYCLE: u16 = 6;

pub const MON_ST_CREATE: u16 = 0xfffd;
pub const MON_ST_DESTROY: u16 = 0xfffe;
pub const MON_ST_INFO: u16 = 0xffff;

pub const MON_ENT_CAL: u16 = 0;
pub const MON_ENT_TEST: u16 = 1;
pub const MON_ENT_XP: u16 = 2;
pub const MON_ENT_CC2420: u16 = 0;
pub const MON_ENT_CONTIKIMAC: u16 = 0;

/// State emitted by the control context once a self check completes.
pub const MON_ST_CHECK: u16 = 6;

const CONTEXTS: [(u16, &str); 7] = [
    (MON_CT_CONTROL, "CONTROL"),
    (MON_CT_SCHED, "SCHED"),
    (MON_CT_NETIN, "NETIN"),
    (MON_CT_NETOUT, "NETOUT"),
    (MON_CT_CPU, "CPU"),
    (MON_CT_RADIO, "RADIO"),
    (MON_CT_POWERCYCLE, "POWERCYCLE"),
];

const COMMON_STATES: [(u16, &str); 3] = [
    (MON_ST_CREATE, "CREATE"),
    (MON_ST_DESTROY, "DESTROY"),
    (MON_ST_INFO, "INFO"),
];

// Indexed by state ID.
const RADIO_STATES: [&str; 12] = [
    "ON", "OFF", "CCA", "ISR", "POLL", "RDC", "READ", "PREPARE", "TRANSMIT", "DEVOFF", "CCA_END",
    "CCA_FAIL",
];

// Indexed by state ID.
const POWERCYCLE_STATES: [&str; 28] = [
    "RADIO_ON_1",
    "RADIO_OFF_1",
    "RADIO_OFF_2",
    "RADIO_OFF_3",
    "RADIO_OFF_4",
    "RADIO_CCA_1",
    "RADIO_CCA_2",
    "LISTEN_TIME_AFTER_PACKET_DETECTED",
    "MAX_SILENCE",
    "FASTSLEEP",
    "PACKET_SEEN",
    "SILENCE",
    "ACTIVITY",
    "RECEIVING",
    "PENDING",
    "NEXT_CCA",
    "NEXT_CCA_CHECK",
    "NEXT_POWERCYCLE",
    "ARCH_SLEEP",
    "FSM_START",
    "FSM_PROBES",
    "FSM_PROBE",
    "FSM_SEEN",
    "FSM_ACTIVITY_CHECK",
    "FSM_PERIODS_CHECK",
    "FSM_PENDING",
    "FSM_SLEEP_END",
    "FSM_END",
];

// Oscillator checks of the XP entity, indexed by state ID.
const XP_STATES: [&str; 6] = ["ACLK", "MCLK", "BLINK", "LFXT1OF", "OFIFG", "NOSLEEP"];

const CONTROL_ENTITIES: [(u16, &str); 3] = [
    (MON_ENT_CAL, "CAL"),
    (MON_ENT_TEST, "TEST"),
    (MON_ENT_XP, "XP"),
];

/// Register the names of every built-in context, state and entity.
pub fn register_mon_ids(names: &mut NameRegistry) -> Result<(), NameError> {
    for (id, name) in CONTEXTS {
        names.register_context(id, name);
    }
    for (id, name) in COMMON_STATES {
        names.register_common_state(id, name);
    }

    register_indexed(names, MON_CT_RADIO, &RADIO_STATES)?;
    names.register_entity(MON_CT_RADIO, MON_ENT_CC2420, "CC2420")?;

    register_indexed(names, MON_CT_POWERCYCLE, &POWERCYCLE_STATES)?;
    names.register_entity(MON_CT_POWERCYCLE, MON_ENT_CONTIKIMAC, "CONTIKIMAC")?;

    register_indexed(names, MON_CT_CONTROL, &XP_STATES)?;
    names.register_state(MON_CT_CONTROL, MON_ST_CHECK, "CHECK")?;
    for (id, name) in CONTROL_ENTITIES {
        names.register_entity(MON_CT_CONTROL, id, name)?;
    }

    log::debug!("registered built-in monitor names");
    Ok(())
}

fn register_indexed(
    names: &mut NameRegistry,
    context: u16,
    states: &[&str],
) -> Result<(), NameError> {
    for (id, name) in (0u16..).zip(states) {
        names.register_state(context, id, *name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> NameRegistry {
        let mut names = NameRegistry::new();
        register_mon_ids(&mut names).unwrap();
        names
    }

    #[test]
    fn test_contexts() {
        let names = registry();
        assert_eq!(names.resolve_context(MON_CT_CONTROL), Some("CONTROL"));
        assert_eq!(names.resolve_context(MON_CT_RADIO), Some("RADIO"));
        assert_eq!(names.resolve_context(MON_CT_POWERCYCLE), Some("POWERCYCLE"));
        assert_eq!(names.resolve_context(7), None);
    }

    #[test]
    fn test_radio_and_powercycle_states() {
        let names = registry();
        assert_eq!(names.resolve_state(MON_CT_RADIO, 0), Some("ON"));
        assert_eq!(names.resolve_state(MON_CT_RADIO, 11), Some("CCA_FAIL"));
        assert_eq!(names.resolve_state(MON_CT_RADIO, 12), None);
        assert_eq!(names.resolve_state(MON_CT_POWERCYCLE, 0), Some("RADIO_ON_1"));
        assert_eq!(names.resolve_state(MON_CT_POWERCYCLE, 27), Some("FSM_END"));
        assert_eq!(names.resolve_entity(MON_CT_RADIO, 0), Some("CC2420"));
        assert_eq!(names.resolve_entity(MON_CT_POWERCYCLE, 0), Some("CONTIKIMAC"));
    }

    #[test]
    fn test_control_context() {
        let names = registry();
        assert_eq!(names.resolve_state(MON_CT_CONTROL, 3), Some("LFXT1OF"));
        assert_eq!(names.resolve_state(MON_CT_CONTROL, MON_ST_CHECK), Some("CHECK"));
        assert_eq!(names.resolve_entity(MON_CT_CONTROL, MON_ENT_XP), Some("XP"));
        assert_eq!(names.resolve_entity(MON_CT_CONTROL, MON_ENT_TEST), Some("TEST"));
    }

    #[test]
    fn test_common_states_everywhere() {
        let names = registry();
        for context in [MON_CT_SCHED, MON_CT_RADIO, 0x1234] {
            assert_eq!(names.resolve_state(context, MON_ST_CREATE), Some("CREATE"));
            assert_eq!(names.resolve_state(context, MON_ST_INFO), Some("INFO"));
        }
    }
}
