use clap::{Args, Parser, Subcommand};
use serde_json::json;

use weathercn_cli::{
    citymap::CityCodeMap,
    client::WeatherClient,
    config::RuntimeConfig,
    error::WeatherError,
    geoip::{FallbackRegionLookup, PconlineLookup, RegionLookup},
    location::LocationSelector,
    model::{WeatherData, WeatherKind},
    resolver::CityResolver,
    transport::{HttpTransport, Transport},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "weather.com.cn crawler (city code resolution + forecasts)")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Current snapshot.
    Now(LocationArgs),
    /// Advisory detail: air quality and lifestyle indices.
    Detail(LocationArgs),
    /// 7-day forecast.
    Week(LocationArgs),
    /// Future-only hourly forecast.
    Hourly {
        #[command(flatten)]
        location: LocationArgs,
        #[arg(long, default_value_t = 24)]
        limit: usize,
    },
    /// 15-day forecast.
    Fifteen(LocationArgs),
    /// Detail, 7-day, hourly and 15-day in one call.
    All {
        #[command(flatten)]
        location: LocationArgs,
        #[arg(long, default_value_t = 24)]
        limit: usize,
    },
    /// IP-derived visitor location.
    Visitor {
        #[arg(long)]
        ip: Option<String>,
    },
}

#[derive(Debug, Args)]
struct LocationArgs {
    /// City name (matched against the city-code table).
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    lat: Option<f64>,
    #[arg(long)]
    lon: Option<f64>,
    /// Resolve via IP geolocation.
    #[arg(long)]
    ip: Option<String>,
    /// Explicit provider city code, bypassing resolution.
    #[arg(long)]
    code: Option<String>,
}

impl Cli {
    fn command_name(&self) -> &'static str {
        match &self.command {
            Commands::Now(_) => "weather.now",
            Commands::Detail(_) => "weather.detail",
            Commands::Week(_) => "weather.week",
            Commands::Hourly { .. } => "weather.hourly",
            Commands::Fifteen(_) => "weather.fifteen",
            Commands::All { .. } => "weather.all",
            Commands::Visitor { .. } => "weather.visitor",
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let command = cli.command_name();
    match run(&cli) {
        Ok(output) => println!("{output}"),
        Err(error) => {
            println!("{}", error_envelope(command, &error));
            std::process::exit(exit_code_for(&error));
        }
    }
}

fn run(cli: &Cli) -> Result<String, WeatherError> {
    let config = RuntimeConfig::from_env();
    let transport = HttpTransport::with_timeout(config.timeout_secs)?;
    let region_lookup = FallbackRegionLookup::new(vec![Box::new(PconlineLookup::new(
        transport.clone(),
    ))]);
    let resolver = CityResolver::new(region_lookup, CityCodeMap::from_file(config.city_map_path));
    let client = WeatherClient::new(transport, resolver);
    run_with(cli, &client)
}

fn run_with<T, G, N>(cli: &Cli, client: &WeatherClient<T, G, N>) -> Result<String, WeatherError>
where
    T: Transport,
    G: RegionLookup,
    N: Fn() -> chrono::DateTime<chrono::Utc>,
{
    let command = cli.command_name();

    let (location, kind, limit) = match &cli.command {
        Commands::Now(location) => (location, WeatherKind::Basic, 24),
        Commands::Detail(location) => (location, WeatherKind::Detail, 24),
        Commands::Week(location) => (location, WeatherKind::SevenDay, 24),
        Commands::Hourly { location, limit } => (location, WeatherKind::Hourly, *limit),
        Commands::Fifteen(location) => (location, WeatherKind::FifteenDay, 24),
        Commands::All { location, limit } => (location, WeatherKind::Comprehensive, *limit),
        Commands::Visitor { ip } => {
            let visitor = client.visitor_data(ip.as_deref(), &[])?;
            return success_envelope(command, &visitor);
        }
    };

    let selector = selector_from_args(location)?;
    let city = client.select(&selector, &[])?;
    let data: WeatherData = client.get_weather(&city, kind, limit)?;
    success_envelope(command, &data)
}

fn selector_from_args(args: &LocationArgs) -> Result<LocationSelector, WeatherError> {
    let provided = [
        args.code.is_some(),
        args.city.is_some(),
        args.lat.is_some() || args.lon.is_some(),
        args.ip.is_some(),
    ];
    if provided.iter().filter(|flag| **flag).count() > 1 {
        return Err(WeatherError::invalid_parameter(
            "location",
            "use only one of --code, --city, --lat/--lon, --ip",
        ));
    }

    if let Some(code) = &args.code {
        return Ok(LocationSelector::CityCode(code.clone()));
    }
    if let Some(city) = &args.city {
        return Ok(LocationSelector::CityName(city.clone()));
    }
    match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => return Ok(LocationSelector::Coordinates { lat, lon }),
        (None, None) => {}
        _ => {
            return Err(WeatherError::invalid_parameter(
                "coordinates",
                "provide both --lat and --lon",
            ));
        }
    }
    if let Some(ip) = &args.ip {
        return Ok(LocationSelector::ClientIp(Some(ip.clone())));
    }

    Err(WeatherError::invalid_parameter(
        "location",
        "use --city, --lat/--lon, --ip or --code",
    ))
}

fn success_envelope<P: serde::Serialize>(
    command: &str,
    payload: &P,
) -> Result<String, WeatherError> {
    let result = serde_json::to_value(payload)
        .map_err(|error| WeatherError::Unknown(format!("serialize result: {error}")))?;
    serde_json::to_string(&json!({
        "ok": true,
        "command": command,
        "result": result,
    }))
    .map_err(|error| WeatherError::Unknown(format!("serialize envelope: {error}")))
}

fn error_envelope(command: &str, error: &WeatherError) -> String {
    serde_json::to_string(&json!({
        "ok": false,
        "command": command,
        "error": {
            "code": error.code(),
            "message": error.to_string(),
        }
    }))
    .unwrap_or_else(|_| {
        format!(
            "{{\"ok\":false,\"command\":\"{command}\",\"error\":{{\"code\":9999,\"message\":\"failed to serialize error envelope\"}}}}"
        )
    })
}

/// Caller mistakes (bad flags, unknown city) exit 2; upstream and
/// runtime failures exit 1.
fn exit_code_for(error: &WeatherError) -> i32 {
    match error.code() {
        1001 | 1004 => 2,
        _ => 1,
    }
}
