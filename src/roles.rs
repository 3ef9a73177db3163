//! Role Registry & Schemas: the static table of roles, factions, abilities,
//! night-step ordering, and per-step action schemas (spec.md §3.3).
//!
//! Specs are the single source of truth; the Action Resolver, the View-Model
//! Builder, and the Death Calculator all read from [`role_spec`] rather than
//! hard-coding role behaviour, mirroring how the teacher crate keeps `Role`
//! and its `default_faction`/`Display` impls as the one place that knows what
//! a role is.

use std::fmt;
use std::str::FromStr;

/// The faction (party) of a player determines their goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Faction {
    Wolf,
    God,
    Special,
    Villager,
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Wolf => write!(f, "狼人阵营"),
            Faction::God => write!(f, "神职阵营"),
            Faction::Special => write!(f, "特殊阵营"),
            Faction::Villager => write!(f, "平民阵营"),
        }
    }
}

/// The label a seer-family reveal exposes for a target, independent of the
/// target's literal faction (spec.md §3.3: "team (for seer-result purposes)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SeerTeam {
    Good,
    Wolf,
}

impl fmt::Display for SeerTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeerTeam::Good => write!(f, "好人"),
            SeerTeam::Wolf => write!(f, "狼人"),
        }
    }
}

/// A role identifier. Enum string per spec.md §3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Seer,
    Witch,
    Guard,
    Wolf,
    WolfQueen,
    Nightmare,
    Gargoyle,
    WolfRobot,
    SpiritKnight,
    Magician,
    Psychic,
    Dreamcatcher,
    Villager,
}

impl Role {
    /// All roles the registry knows about, in no particular order.
    pub const ALL: [Role; 13] = [
        Role::Seer,
        Role::Witch,
        Role::Guard,
        Role::Wolf,
        Role::WolfQueen,
        Role::Nightmare,
        Role::Gargoyle,
        Role::WolfRobot,
        Role::SpiritKnight,
        Role::Magician,
        Role::Psychic,
        Role::Dreamcatcher,
        Role::Villager,
    ];

    /// Looks up this role's static spec. Total function: every `Role` variant
    /// has an entry in [`role_spec`].
    pub fn spec(self) -> &'static RoleSpec {
        role_spec(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spec().display_name)
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Role, ()> {
        match &s.to_lowercase()[..] {
            "seer" => Ok(Role::Seer),
            "witch" => Ok(Role::Witch),
            "guard" => Ok(Role::Guard),
            "wolf" => Ok(Role::Wolf),
            "wolfqueen" => Ok(Role::WolfQueen),
            "nightmare" => Ok(Role::Nightmare),
            "gargoyle" => Ok(Role::Gargoyle),
            "wolfrobot" => Ok(Role::WolfRobot),
            "spiritknight" => Ok(Role::SpiritKnight),
            "magician" => Ok(Role::Magician),
            "psychic" => Ok(Role::Psychic),
            "dreamcatcher" => Ok(Role::Dreamcatcher),
            "villager" => Ok(Role::Villager),
            _ => Err(()),
        }
    }
}

/// A reveal role is one whose action returns private information; the
/// Coordinator withholds advancing the night until it sees an explicit
/// `REVEAL_ACK` for these roles (spec.md §4.3, GLOSSARY "Reveal role").
pub fn is_reveal_role(role: Role) -> bool {
    matches!(
        role,
        Role::Seer | Role::Psychic | Role::Gargoyle | Role::WolfRobot
    )
}

/// The shape of a valid action input for a night step (spec.md §3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Constraint {
    NotSelf,
}

/// Meeting configuration for `wolfVote` steps.
#[derive(Debug, Clone)]
pub struct MeetingConfig {
    pub can_see_each_other: bool,
    pub forbidden_target_roles: &'static [Role],
}

/// The static contract describing valid inputs and constraints for one night step.
#[derive(Debug, Clone)]
pub enum ActionSchema {
    ChooseSeat {
        constraints: &'static [Constraint],
        allow_skip: bool,
    },
    Swap {
        constraints: &'static [Constraint],
    },
    WolfVote {
        meeting: MeetingConfig,
        constraints: &'static [Constraint],
    },
    Compound {
        steps: &'static [(&'static str, ActionSchema)],
    },
}

const WOLF_MEETING_FORBIDDEN: &[Role] = &[Role::WolfQueen, Role::SpiritKnight];

/// Static per-role spec: the single source of truth every other component reads from.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    pub role: Role,
    pub display_name: &'static str,
    pub faction: Faction,
    pub seer_team: SeerTeam,
    pub can_see_wolves: bool,
    pub participates_in_wolf_vote: bool,
    /// `None` if this role has no first-night ability (e.g. Villager).
    pub night_schema: Option<fn() -> ActionSchema>,
}

fn seat_schema(notself: bool) -> ActionSchema {
    ActionSchema::ChooseSeat {
        constraints: if notself { &[Constraint::NotSelf] } else { &[] },
        allow_skip: false,
    }
}

fn nightmare_schema() -> ActionSchema {
    ActionSchema::ChooseSeat {
        constraints: &[],
        allow_skip: true,
    }
}

fn seer_schema() -> ActionSchema {
    seat_schema(true)
}

fn guard_schema() -> ActionSchema {
    seat_schema(false)
}

fn gargoyle_schema() -> ActionSchema {
    seat_schema(true)
}

fn wolf_robot_schema() -> ActionSchema {
    seat_schema(true)
}

fn psychic_schema() -> ActionSchema {
    seat_schema(true)
}

fn dreamcatcher_schema() -> ActionSchema {
    seat_schema(true)
}

fn wolf_queen_charm_schema() -> ActionSchema {
    seat_schema(true)
}

fn magician_schema() -> ActionSchema {
    ActionSchema::Swap {
        constraints: &[Constraint::NotSelf],
    }
}

fn witch_schema() -> ActionSchema {
    ActionSchema::Compound {
        steps: &[
            (
                "save",
                ActionSchema::ChooseSeat {
                    constraints: &[Constraint::NotSelf],
                    allow_skip: true,
                },
            ),
            (
                "poison",
                ActionSchema::ChooseSeat {
                    constraints: &[],
                    allow_skip: true,
                },
            ),
        ],
    }
}

fn wolf_kill_schema() -> ActionSchema {
    ActionSchema::WolfVote {
        meeting: MeetingConfig {
            can_see_each_other: true,
            forbidden_target_roles: WOLF_MEETING_FORBIDDEN,
        },
        constraints: &[],
    }
}

/// Returns the static spec for a role. Total over [`Role`].
pub fn role_spec(role: Role) -> &'static RoleSpec {
    static SEER: RoleSpec = RoleSpec {
        role: Role::Seer,
        display_name: "预言家",
        faction: Faction::God,
        seer_team: SeerTeam::Good,
        can_see_wolves: false,
        participates_in_wolf_vote: false,
        night_schema: Some(seer_schema),
    };
    static WITCH: RoleSpec = RoleSpec {
        role: Role::Witch,
        display_name: "女巫",
        faction: Faction::God,
        seer_team: SeerTeam::Good,
        can_see_wolves: false,
        participates_in_wolf_vote: false,
        night_schema: Some(witch_schema),
    };
    static GUARD: RoleSpec = RoleSpec {
        role: Role::Guard,
        display_name: "守卫",
        faction: Faction::God,
        seer_team: SeerTeam::Good,
        can_see_wolves: false,
        participates_in_wolf_vote: false,
        night_schema: Some(guard_schema),
    };
    static WOLF: RoleSpec = RoleSpec {
        role: Role::Wolf,
        display_name: "狼人",
        faction: Faction::Wolf,
        seer_team: SeerTeam::Wolf,
        can_see_wolves: true,
        participates_in_wolf_vote: true,
        night_schema: Some(wolf_kill_schema),
    };
    static WOLF_QUEEN: RoleSpec = RoleSpec {
        role: Role::WolfQueen,
        display_name: "狼美人",
        faction: Faction::Wolf,
        seer_team: SeerTeam::Wolf,
        can_see_wolves: true,
        participates_in_wolf_vote: true,
        night_schema: Some(wolf_queen_charm_schema),
    };
    static NIGHTMARE: RoleSpec = RoleSpec {
        role: Role::Nightmare,
        display_name: "梦魇",
        faction: Faction::Wolf,
        seer_team: SeerTeam::Wolf,
        can_see_wolves: true,
        participates_in_wolf_vote: false,
        night_schema: Some(nightmare_schema),
    };
    static GARGOYLE: RoleSpec = RoleSpec {
        role: Role::Gargoyle,
        display_name: "石像鬼",
        faction: Faction::Special,
        seer_team: SeerTeam::Good,
        can_see_wolves: false,
        participates_in_wolf_vote: false,
        night_schema: Some(gargoyle_schema),
    };
    static WOLF_ROBOT: RoleSpec = RoleSpec {
        role: Role::WolfRobot,
        display_name: "狼机器人",
        faction: Faction::Special,
        seer_team: SeerTeam::Good,
        can_see_wolves: false,
        participates_in_wolf_vote: false,
        night_schema: Some(wolf_robot_schema),
    };
    static SPIRIT_KNIGHT: RoleSpec = RoleSpec {
        role: Role::SpiritKnight,
        display_name: "恶灵骑士",
        faction: Faction::Wolf,
        seer_team: SeerTeam::Wolf,
        can_see_wolves: true,
        participates_in_wolf_vote: true,
        night_schema: None,
    };
    static MAGICIAN: RoleSpec = RoleSpec {
        role: Role::Magician,
        display_name: "魔术师",
        faction: Faction::Special,
        seer_team: SeerTeam::Good,
        can_see_wolves: false,
        participates_in_wolf_vote: false,
        night_schema: Some(magician_schema),
    };
    static PSYCHIC: RoleSpec = RoleSpec {
        role: Role::Psychic,
        display_name: "通灵师",
        faction: Faction::God,
        seer_team: SeerTeam::Good,
        can_see_wolves: false,
        participates_in_wolf_vote: false,
        night_schema: Some(psychic_schema),
    };
    static DREAMCATCHER: RoleSpec = RoleSpec {
        role: Role::Dreamcatcher,
        display_name: "摄梦人",
        faction: Faction::God,
        seer_team: SeerTeam::Good,
        can_see_wolves: false,
        participates_in_wolf_vote: false,
        night_schema: Some(dreamcatcher_schema),
    };
    static VILLAGER: RoleSpec = RoleSpec {
        role: Role::Villager,
        display_name: "平民",
        faction: Faction::Villager,
        seer_team: SeerTeam::Good,
        can_see_wolves: false,
        participates_in_wolf_vote: false,
        night_schema: None,
    };

    match role {
        Role::Seer => &SEER,
        Role::Witch => &WITCH,
        Role::Guard => &GUARD,
        Role::Wolf => &WOLF,
        Role::WolfQueen => &WOLF_QUEEN,
        Role::Nightmare => &NIGHTMARE,
        Role::Gargoyle => &GARGOYLE,
        Role::WolfRobot => &WOLF_ROBOT,
        Role::SpiritKnight => &SPIRIT_KNIGHT,
        Role::Magician => &MAGICIAN,
        Role::Psychic => &PSYCHIC,
        Role::Dreamcatcher => &DREAMCATCHER,
        Role::Villager => &VILLAGER,
    }
}

/// One entry in the ordered Night Plan.
#[derive(Debug, Clone)]
pub struct NightStep {
    pub step_id: String,
    pub role: Role,
    pub schema: ActionSchema,
}

/// The immutable, template-derived sequence of night steps for one night.
///
/// Derived deterministically (spec.md §3.3): select, from a globally-ordered
/// list of night steps, those whose role is present in the template. The
/// wolf meeting step is included if *any* wolf-vote-participating role is
/// present, since several distinct roles (wolf, wolf queen, spirit knight)
/// share that single step.
///
/// The global order (`Nightmare, Magician, WolfQueen, Wolf, Guard, Witch,
/// Seer, Psychic, Gargoyle, WolfRobot, Dreamcatcher`) is an implementation
/// decision: nightmare must act before the wolf meeting so its block can
/// reject a same-night action from the blocked seat (spec.md §4.3
/// "Blocking"); the wolf meeting must resolve before the witch's step so
/// `WITCH_CONTEXT.killedSeat` is known (spec.md §4.3 "Per-step loop"); and
/// the magician must swap before every reveal role so seer/psychic/gargoyle/
/// wolf-robot checks read the post-swap map (spec.md E2E-6, §4.3 "Magician
/// swap").
#[derive(Debug, Clone)]
pub struct NightPlan {
    pub steps: Vec<NightStep>,
}

const GLOBAL_NIGHT_ORDER: &[Role] = &[
    Role::Nightmare,
    Role::Magician,
    Role::WolfQueen,
    Role::Wolf,
    Role::Guard,
    Role::Witch,
    Role::Seer,
    Role::Psychic,
    Role::Gargoyle,
    Role::WolfRobot,
    Role::Dreamcatcher,
];

impl NightPlan {
    /// Derives the Night Plan from a dealt template (a multiset of roles).
    pub fn derive(template: &[Role]) -> NightPlan {
        let present = |role: Role| template.contains(&role);
        let wolf_meeting_present = template.iter().any(|&r| r.spec().participates_in_wolf_vote);

        let mut steps = Vec::new();
        for (idx, &role) in GLOBAL_NIGHT_ORDER.iter().enumerate() {
            let included = if role == Role::Wolf {
                wolf_meeting_present
            } else {
                present(role)
            };
            if !included {
                continue;
            }
            let schema = role
                .spec()
                .night_schema
                .map(|f| f())
                .unwrap_or_else(|| unreachable!("{role:?} is in GLOBAL_NIGHT_ORDER without a schema"));
            steps.push(NightStep {
                step_id: format!("step-{idx}-{role:?}"),
                role,
                schema,
            });
        }
        NightPlan { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NightStep> {
        self.steps.get(index)
    }
}
