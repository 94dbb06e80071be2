//! Human-readable rendering of API payloads.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use openuv_core::{
    Payload, ProtectionWindow, UvForecast, UvIndex, model::ApiStatistics, parse_result,
};

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn raw(payload: &Payload) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

pub fn uv_index(payload: &Payload, json: bool) -> Result<()> {
    if json {
        return raw(payload);
    }

    let uv: UvIndex = parse_result(payload).context("Unexpected UV index payload")?;
    println!("{}", render_uv_index(&uv));
    Ok(())
}

fn render_uv_index(uv: &UvIndex) -> String {
    format!(
        "UV index: {:.1} (at {})\nMax today: {:.1} (at {})\nOzone: {:.1} DU",
        uv.uv,
        local_time(uv.uv_time),
        uv.uv_max,
        local_time(uv.uv_max_time),
        uv.ozone,
    )
}

pub fn forecast(payload: &Payload, json: bool) -> Result<()> {
    if json {
        return raw(payload);
    }

    let forecast: UvForecast = parse_result(payload).context("Unexpected forecast payload")?;
    println!("{}", render_forecast(&forecast));
    Ok(())
}

fn render_forecast(forecast: &UvForecast) -> String {
    if forecast.is_empty() {
        return "No forecast data".to_string();
    }

    forecast
        .iter()
        .map(|entry| format!("{}  UV {:.1}", local_time(entry.uv_time), entry.uv))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn protection_window(payload: &Payload, json: bool) -> Result<()> {
    if json {
        return raw(payload);
    }

    let window: ProtectionWindow =
        parse_result(payload).context("Unexpected protection window payload")?;
    println!("{}", render_protection_window(&window));
    Ok(())
}

fn render_protection_window(window: &ProtectionWindow) -> String {
    match (window.from_time, window.to_time) {
        (Some(from), Some(to)) => format!(
            "Protection needed from {} to {}",
            local_time(from),
            local_time(to)
        ),
        _ => "No UV protection needed today".to_string(),
    }
}

pub fn statistics(payload: &Payload, json: bool) -> Result<()> {
    if json {
        return raw(payload);
    }

    let stats: ApiStatistics = parse_result(payload).context("Unexpected statistics payload")?;
    for (period, count) in &stats {
        println!("{period}: {count}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_protection_window_says_so() {
        let window = ProtectionWindow {
            from_time: None,
            from_uv: None,
            to_time: None,
            to_uv: None,
        };
        assert_eq!(render_protection_window(&window), "No UV protection needed today");
    }

    #[test]
    fn protection_window_shows_both_ends() {
        let from = Utc.with_ymd_and_hms(2018, 7, 30, 15, 17, 49).unwrap();
        let to = Utc.with_ymd_and_hms(2018, 7, 30, 22, 47, 49).unwrap();
        let window = ProtectionWindow {
            from_time: Some(from),
            from_uv: Some(3.2509),
            to_time: Some(to),
            to_uv: Some(3.6483),
        };

        let text = render_protection_window(&window);
        assert!(text.starts_with("Protection needed from"));
        assert!(text.contains(&local_time(from)));
        assert!(text.contains(&local_time(to)));
    }

    #[test]
    fn empty_forecast_says_so() {
        assert_eq!(render_forecast(&Vec::new()), "No forecast data");
    }
}
