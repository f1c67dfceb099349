//! Shiv Arena authority host.
//!
//! Loads config, initializes logging, and runs the authoritative session at
//! a fixed tick rate. A transport adapter plugs into the session through
//! `submit_wire` / `drain_outbound`; until one is attached, the host can run
//! scripted local participants (`--bots`) so the full request → validate →
//! replicate path is exercised end to end.
//!
//! Run with: `cargo run -p shiv-server -- --bots 4`

use std::time::{Duration, Instant};

use clap::Parser;
use rand::Rng;
use tracing::{debug, info};

use shiv_config::{CliArgs, Config};
use shiv_replication::ParticipantId;
use shiv_rpc::{ClientRequest, RequestEnvelope};
use shiv_session::AuthoritySession;
use shiv_sim::{FlatArena, thread_source};
use shiv_timing::TickSchedule;

/// A scripted local participant: joins, registers a name, and pokes the
/// session with occasional combat inputs.
struct Bot {
    id: ParticipantId,
    seq: u64,
    rng: rand::rngs::ThreadRng,
}

impl Bot {
    fn new(id: ParticipantId) -> Self {
        Self {
            id,
            seq: 0,
            rng: rand::rng(),
        }
    }

    fn send(&mut self, session: &mut AuthoritySession, request: ClientRequest) {
        self.seq += 1;
        session.submit(
            self.id,
            RequestEnvelope {
                seq: self.seq,
                request,
            },
        );
    }

    fn act(&mut self, session: &mut AuthoritySession) {
        let roll: f32 = self.rng.random();
        if roll < 0.010 {
            self.send(session, ClientRequest::Attack);
        } else if roll < 0.014 {
            self.send(session, ClientRequest::Dash);
        } else if roll < 0.016 {
            let aim = [
                self.rng.random_range(-30.0..30.0),
                0.5,
                self.rng.random_range(-30.0..30.0),
            ];
            self.send(session, ClientRequest::ThrowKnife { aim });
        }
    }
}

fn main() {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(Config::default_dir);
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|err| {
        eprintln!("config unavailable ({err}), using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    shiv_log::init_logging(None, cfg!(debug_assertions), Some(&config));

    info!(
        "Shiv Arena host at {}:{} (tick {} Hz, max {} participants)",
        config.network.bind_address,
        config.network.port,
        config.network.tick_rate,
        config.network.max_participants,
    );

    let mut session =
        AuthoritySession::new(&config, Box::new(FlatArena), Box::new(thread_source()));

    let mut bots: Vec<Bot> = (0..args.bots)
        .map(|i| Bot::new(ParticipantId(u64::from(i) + 1)))
        .collect();
    for bot in &mut bots {
        session.connect(bot.id);
        let name = format!("Bot{}", bot.id.0);
        bot.send(&mut session, ClientRequest::Chat { text: name });
    }
    if !bots.is_empty() {
        info!("{} scripted participants joined", bots.len());
    }

    let mut schedule = TickSchedule::with_tick_rate(config.network.tick_rate);
    let mut last = Instant::now();
    loop {
        let now = Instant::now();
        let ticks = schedule.accumulate(now - last);
        last = now;

        for _ in 0..ticks {
            for bot in &mut bots {
                bot.act(&mut session);
            }
            session.tick(schedule.tick_duration());
            let outbound = session.drain_outbound();
            if !outbound.is_empty() {
                debug!(count = outbound.len(), "outbound replication");
            }
        }

        std::thread::sleep(Duration::from_millis(2));
    }
}
