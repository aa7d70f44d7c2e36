use chrono::Utc;
use clap::Parser;
use log::{debug, error, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use simtraffic::{
  aircraft::simulated::AircraftModel,
  config::read_config,
  feed::{
    scenario::{load_scenario, Scenario},
    synth::SyntheticFeed,
    FeedEvent,
  },
  ground::FlatTerrain,
  interpolate::InterpolationSetup,
  provider::{ProviderEvent, RemoteAircraftProvider},
  types::{Callsign, Point},
  util::{epoch_millis_now, seconds_since, Counter},
};
use std::sync::Arc;
use tokio::time::{interval, sleep, Duration};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
struct Args {
  #[arg(short, default_value = "/etc/simtraffic.toml")]
  config: String,
  /// replay a recorded trace instead of generating synthetic traffic
  #[arg(short, long)]
  scenario: Option<String>,
  /// stop after this many seconds, 0 runs forever
  #[arg(short, long, default_value_t = 0u64)]
  duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let args = Args::parse();
  let config = read_config(Some(&args.config));

  TermLogger::init(
    config.log.level,
    Config::default(),
    TerminalMode::Stdout,
    ColorChoice::Always,
  )
  .unwrap();

  info!("starting simtraffic version {}", VERSION);

  let terrain = Arc::new(FlatTerrain {
    elevation_ft: config.feed.field_elevation_ft,
  });
  let setup = InterpolationSetup {
    mode: config.interpolation.mode,
    time_offset_ms: config.interpolation.time_offset.as_millis() as i64,
    cg_override_ft: None,
    pitch_on_ground_deg: config.interpolation.pitch_on_ground_deg,
  };
  let provider = Arc::new(RemoteAircraftProvider::new(terrain, setup));
  provider.enable_reverse_lookup_messages(config.provider.reverse_lookup_messages);

  // event logger, the in-repo stand-in for UI/simulator subscribers
  {
    let mut rx = provider.subscribe();
    tokio::spawn(async move {
      loop {
        match rx.recv().await {
          Ok(ProviderEvent::RemovedAircraft(cs)) => info!("aircraft removed: {cs}"),
          Ok(ProviderEvent::AircraftEnabledChanged(cs, enabled)) => {
            info!("aircraft {cs} enabled: {enabled}")
          }
          Ok(ProviderEvent::SnapshotReady(snap)) => {
            debug!(
              "snapshot: {} aircraft, {} enabled in range",
              snap.total_count,
              snap.enabled_in_range.len()
            )
          }
          Ok(_) => {}
          Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
            debug!("event logger lagged by {n}")
          }
          Err(_) => break,
        }
      }
    });
  }

  // feed task, the stand-in for the network/parsing layer
  {
    let provider = provider.clone();
    let scenario_path = args.scenario.clone().or_else(|| config.feed.scenario.clone());
    let feed_cfg = config.feed.clone();
    tokio::spawn(async move {
      match scenario_path {
        Some(path) => match load_scenario(&path) {
          Ok(scenario) => {
            info!(
              "replaying scenario '{}': {} events over {}s",
              scenario.name,
              scenario.events.len(),
              scenario.duration_ms() / 1000
            );
            replay(provider, scenario).await;
          }
          Err(err) => error!("cannot load scenario {path}: {err}"),
        },
        None => {
          info!(
            "generating synthetic traffic for {} aircraft",
            feed_cfg.aircraft
          );
          let feed = SyntheticFeed::new(&feed_cfg, epoch_millis_now() as u64);
          synthesize(provider, feed, feed_cfg.update_period).await;
        }
      }
    });
  }

  // render loop: one interpolation per known callsign per frame
  {
    let provider = provider.clone();
    let sim_cfg = config.sim.clone();
    tokio::spawn(async move {
      let mut frames = interval(sim_cfg.render_interval);
      let snapshot_every = (1000 / sim_cfg.render_interval.as_millis().max(1)) as u32;
      let mut snapshot_countdown = 0u32;
      loop {
        frames.tick().await;
        let t = Utc::now();
        let now_ms = epoch_millis_now();
        let mut reference: Option<Point> = None;
        for cs in provider.aircraft_callsigns() {
          let result = provider.interpolate(&cs, now_ms);
          if let Some(s) = &result.situation {
            if reference.is_none() {
              reference = Some(s.position);
            }
            debug!(
              "{cs}: lat {:.4} lng {:.4} alt {:.0}ft gnd {} ({})",
              s.position.lat,
              s.position.lng,
              s.altitude_ft,
              s.is_on_ground(),
              if result.status.is_interpolated() {
                "interpolated"
              } else {
                "held"
              }
            );
          }
        }
        provider.track_processing_time("render", seconds_since(t));

        // roughly once a second refresh the airspace snapshot
        snapshot_countdown += 1;
        if snapshot_countdown >= snapshot_every {
          snapshot_countdown = 0;
          if let Some(reference) = reference {
            provider.compute_airspace_snapshot(
              reference,
              sim_cfg.render_range_nm,
              sim_cfg.max_rendered_aircraft,
            );
          }
        }
      }
    });
  }

  // periodic metrics dump
  {
    let provider = provider.clone();
    let period = config.sim.metrics_interval;
    tokio::spawn(async move {
      let mut ticks = interval(period);
      loop {
        ticks.tick().await;
        info!("metrics:\n{}", provider.render_metrics());
      }
    });
  }

  if args.duration > 0 {
    sleep(Duration::from_secs(args.duration)).await;
    info!("done after {}s", args.duration);
  } else {
    std::future::pending::<()>().await;
  }
  Ok(())
}

/// Push a recorded trace into the provider with its original relative
/// timing, shifted onto the wall clock.
async fn replay(provider: Arc<RemoteAircraftProvider>, scenario: Scenario) {
  let base_ms = epoch_millis_now();
  for event in scenario.events.into_iter() {
    let due_ms = base_ms + event.timestamp_ms();
    let wait_ms = due_ms - epoch_millis_now();
    if wait_ms > 0 {
      sleep(Duration::from_millis(wait_ms as u64)).await;
    }
    let event = restamp(event, due_ms);
    dispatch(&provider, event, &scenario.models);
  }
  info!("scenario replay finished");
}

async fn synthesize(
  provider: Arc<RemoteAircraftProvider>,
  mut feed: SyntheticFeed,
  period: Duration,
) {
  let mut ticks = interval(period);
  let mut updates = Counter::new();
  let mut tick_no = 0u64;
  loop {
    ticks.tick().await;
    let t = Utc::now();
    let now_ms = epoch_millis_now();
    for event in feed.tick(now_ms, period.as_secs_f64()) {
      updates.inc(event.callsign().clone());
      dispatch(&provider, event, &[]);
    }
    provider.track_processing_time("feed", seconds_since(t));

    tick_no += 1;
    if tick_no % 12 == 0 {
      let total: usize = updates.values().sum();
      info!("feed: {} updates across {} aircraft", total, updates.len());
    }
  }
}

fn restamp(event: FeedEvent, timestamp_ms: i64) -> FeedEvent {
  match event {
    FeedEvent::Situation(mut s) => {
      s.timestamp_ms = timestamp_ms;
      FeedEvent::Situation(s)
    }
    FeedEvent::Parts(cs, mut p) => {
      p.timestamp_ms = timestamp_ms;
      FeedEvent::Parts(cs, p)
    }
  }
}

fn dispatch(
  provider: &RemoteAircraftProvider,
  event: FeedEvent,
  models: &[(Callsign, AircraftModel)],
) {
  match event {
    FeedEvent::Situation(situation) => {
      let callsign = situation.callsign.clone();
      let first_sighting = provider.aircraft_for_callsign(&callsign).is_none();
      provider.store_aircraft_situation(situation);
      if first_sighting {
        if let Some((_, model)) = models.iter().find(|(cs, _)| *cs == callsign) {
          provider.update_aircraft_model(&callsign, model.clone());
        }
      }
    }
    FeedEvent::Parts(callsign, parts) => {
      provider.store_aircraft_parts(&callsign, parts);
    }
  }
}
