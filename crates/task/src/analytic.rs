//! Identifiers of the analytic computations run in the background

use esoworker_core::{Error, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! analytic_tasks {
    ($($(#[$doc:meta])* $variant:ident => $name:literal,)+) => {
        /// Known combat-log analyses
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum AnalyticTask {
            $(
                $(#[$doc])*
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl AnalyticTask {
            /// Every known task, in declaration order
            pub const ALL: &'static [AnalyticTask] = &[$(AnalyticTask::$variant,)+];

            /// Stable string identifier
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(AnalyticTask::$variant => $name,)+
                }
            }
        }

        impl FromStr for AnalyticTask {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(AnalyticTask::$variant),)+
                    other => Err(Error::unknown_task(other)),
                }
            }
        }
    };
}

analytic_tasks! {
    /// Interpolated positions of every actor over the fight
    ActorPositions => "calculateActorPositions",
    /// Friendly buff intervals by ability and target
    BuffLookup => "calculateBuffLookup",
    DebuffLookup => "calculateDebuffLookup",
    /// Buffs applied to hostile targets
    HostileBuffLookup => "calculateHostileBuffLookup",
    CriticalDamage => "calculateCriticalDamageData",
    Penetration => "calculatePenetrationData",
    DamageReduction => "calculateDamageReductionData",
    StatusEffectUptimes => "calculateStatusEffectUptimes",
    DamageOverTime => "calculateDamageOverTimeData",
    StaggerStacks => "calculateStaggerStacks",
    TouchOfZenStacks => "calculateTouchOfZenStacks",
    ElementalWeaknessStacks => "calculateElementalWeaknessStacks",
    ScribingDetections => "calculateScribingDetections",
}

impl fmt::Display for AnalyticTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AnalyticTask> for TaskId {
    fn from(task: AnalyticTask) -> Self {
        TaskId::new(task.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identifiers_are_unique() {
        let names: HashSet<&str> = AnalyticTask::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(names.len(), AnalyticTask::ALL.len());
    }

    #[test]
    fn test_parse_round_trip() {
        for task in AnalyticTask::ALL {
            assert_eq!(task.as_str().parse::<AnalyticTask>().unwrap(), *task);
        }
        assert!(matches!(
            "calculateNothing".parse::<AnalyticTask>(),
            Err(Error::UnknownTask { .. })
        ));
    }

    #[test]
    fn test_serde_uses_identifier() {
        let json = serde_json::to_string(&AnalyticTask::StaggerStacks).unwrap();
        assert_eq!(json, "\"calculateStaggerStacks\"");
        let task: AnalyticTask = serde_json::from_str("\"calculateBuffLookup\"").unwrap();
        assert_eq!(task, AnalyticTask::BuffLookup);
    }

    #[test]
    fn test_into_task_id() {
        let id: TaskId = AnalyticTask::TouchOfZenStacks.into();
        assert_eq!(id.as_str(), "calculateTouchOfZenStacks");
        assert_eq!(AnalyticTask::ActorPositions.to_string(), "calculateActorPositions");
    }
}
