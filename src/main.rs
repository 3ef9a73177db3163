#![deny(rust_2018_idioms, unused_import_braces, unused_lifetimes, unused_qualifications)]
#![forbid(unsafe_code)]

use std::io::{prelude::*, stdin, stdout};
use std::str::FromStr;
use std::{env, string::ToString};

use nightward::audio::AudioPlayer;
use nightward::protocol::{PeerMessage, PublicMessage, SeatAction};
use nightward::roles::Role;
use nightward::transport::Transport;
use nightward::{Coordinator, CoordinatorConfig};

struct Args {
    roles: Option<Vec<Role>>,
}

impl Args {
    fn set_roles(&mut self, roles: &str) {
        self.roles = Some(
            roles
                .split(',')
                .map(|role_str| Role::from_str(role_str).expect("no such role"))
                .collect(),
        );
    }
}

impl Default for Args {
    fn default() -> Args {
        Args { roles: None }
    }
}

fn args() -> Args {
    enum ArgsMode {
        Roles,
    }

    let mut args = Args::default();
    let mut mode = None;
    for arg in env::args().skip(1) {
        match mode {
            Some(ArgsMode::Roles) => {
                args.set_roles(&arg);
                mode = None;
            }
            None => {
                if arg != "-" && arg.starts_with('-') {
                    if arg.starts_with("--") {
                        if arg == "--roles" {
                            mode = Some(ArgsMode::Roles);
                        } else if let Some(roles) = arg.strip_prefix("--roles=") {
                            args.set_roles(roles);
                        } else {
                            panic!("unrecognized flag: {:?}", arg);
                        }
                    } else {
                        for (i, short_flag) in arg.chars().enumerate() {
                            if i == 0 {
                                continue;
                            }
                            panic!("unrecognized flag: -{:?}", short_flag);
                        }
                    }
                } else {
                    panic!("unexpected positional argument: {:?}", arg);
                }
            }
        }
    }
    args
}

fn join<S: ToString, I: IntoIterator<Item = S>>(words: I) -> String {
    let mut words = words.into_iter().map(|word| word.to_string()).collect::<Vec<_>>();
    match words.len() {
        0 => "no one".to_owned(),
        1 => words.swap_remove(0),
        2 => format!("{} and {}", words.swap_remove(0), words.swap_remove(0)),
        _ => {
            let last = words.pop().unwrap();
            format!("{}, and {}", words.join(", "), last)
        }
    }
}

fn read_line(prompt: &str) -> String {
    print!("{prompt}");
    stdout().flush().expect("failed to flush stdout");
    let mut line = String::new();
    stdin().read_line(&mut line).expect("failed to read input");
    if line.ends_with('\n') {
        line.pop();
    }
    line
}

/// A console transport: every outbound message is narrated as a line of
/// text, generalizing the teacher crate's `CliHandler` (which narrated game
/// events with `println!`) to this crate's typed [`PublicMessage`] stream.
struct ConsoleTransport;

impl Transport for ConsoleTransport {
    async fn broadcast(&mut self, message: PublicMessage) {
        match message {
            PublicMessage::RoleTurn { role, pending_seats, .. } => {
                println!("[ ** ] {role}'s turn (seats {pending_seats:?})");
            }
            PublicMessage::NightEnd { deaths } => {
                println!("[ ** ] night ends. dead: {}", join(deaths.iter().map(|s| format!("seat {s}"))));
            }
            PublicMessage::SeatRejected { seat, reason, .. } => {
                println!("[ !! ] seat {seat} rejected: {reason}");
            }
            PublicMessage::PrivateEffect { to_uid, payload, .. } => {
                println!("[ >> ] {to_uid}: {payload:?}");
            }
            PublicMessage::GameRestarted {} => {
                println!("[ ** ] the game has been restarted");
            }
            _ => {}
        }
    }
}

/// No audio backend in this simulation; a real deployment supplies one
/// implementing [`AudioPlayer`] against its own playback engine.
struct SilentAudio;

impl AudioPlayer for SilentAudio {
    async fn play_night_begin_audio(&mut self) {}
    async fn play_role_beginning_audio(&mut self, _role: Role) {}
    async fn play_role_ending_audio(&mut self, _role: Role) {}
    async fn play_night_end_audio(&mut self) {}
    async fn stop(&mut self) {}
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = args();

    let mut uids = Vec::new();
    loop {
        let name = read_line("[ ?? ] player name [leave blank to finish]: ");
        if name.is_empty() {
            break;
        }
        if uids.contains(&name) {
            println!("[ !! ] duplicate player name");
            continue;
        }
        uids.push(name);
    }

    let template = args.roles.unwrap_or_else(|| vec![Role::Villager; uids.len().max(1)]);
    if template.len() != uids.len() {
        panic!("template has {} roles but {} players signed up", template.len(), uids.len());
    }

    let mut coordinator = Coordinator::new(
        "sim".to_string(),
        uids.first().cloned().unwrap_or_default(),
        template,
        ConsoleTransport,
        SilentAudio,
        CoordinatorConfig::default(),
    );

    for (seat, uid) in uids.iter().enumerate() {
        coordinator
            .handle_peer_message(PeerMessage::SeatActionRequest {
                request_id: format!("sit-{seat}"),
                action: SeatAction::Sit,
                seat: seat as i32,
                uid: uid.clone(),
                display_name: Some(uid.clone()),
                avatar_url: None,
            })
            .await;
    }

    coordinator.assign_roles().await;
    for seat in 0..uids.len() {
        coordinator.viewed_role(seat as i32).await;
    }
    coordinator.start_game().await;

    // Drive the night one step at a time: at each prompt, the current step's
    // role acts for whichever seat holds it. `PublicState::current_step_index`
    // plus the locally-derived Night Plan is enough to know whose turn it is,
    // since the plan is a deterministic function of the dealt template
    // (spec.md §3.3) — the same trick the View-Model Builder uses client-side.
    while coordinator.state().status == nightward::Status::Ongoing {
        let plan = nightward::roles::NightPlan::derive(&coordinator.state().template);
        let Some(step) = plan.get(coordinator.state().current_step_index) else { break };
        let role = step.role;
        let Some(seat) = coordinator.state().players.values().find(|slot| slot.role == Some(role)).map(|slot| slot.seat_number) else {
            break;
        };

        if role == Role::Wolf {
            let line = read_line(&format!("[ ?? ] seat {seat} ({role}) wolf vote target (blank to abstain): "));
            let target = if line.is_empty() { -1 } else { line.parse().unwrap_or(-1) };
            coordinator.handle_wolf_vote(seat, target).await;
        } else {
            let line = read_line(&format!("[ ?? ] seat {seat} ({role}) target (blank to skip): "));
            let target = line.parse().ok();
            coordinator.handle_action(seat, role, target, None).await;
            if let Some(ack) = coordinator.state().pending_reveal_acks.iter().find(|(_, r)| *r == role).map(|&(revision, role)| (revision, role)) {
                coordinator.handle_reveal_ack(seat, ack.1, ack.0).await;
            }
        }
    }

    println!("[ ** ] simulation ended. deaths: {}", join(coordinator.state().last_night_deaths.iter().map(|s| format!("seat {s}"))));
}
