//! Flight show-up pipeline
//!
//! Scores unscored `flightdetails` rows with a no-show regressor and stores the show-up
//! percentage in `Probability`.

use super::{PipelineSpec, TargetTable, ValueTransform};
use crate::frame::{FeatureColumn, FeatureSchema, FeatureValue, KeyKind};

// Global means standing in for per-flight aggregates the store lacks
pub const DEFAULT_FREQUENT_FLYER_RATIO: f64 = 0.25;
pub const DEFAULT_LAST_MIN_BOOKINGS: i64 = 60;
pub const DEFAULT_WEATHER_IMPACT: i64 = 0;

const SELECT_SQL: &str = r#"
SELECT
    fd.Id                AS FlightID,
    ac.Airline           AS Airline,
    ac.SeatCapacity      AS Flight_Capacity,
    o.IataCode           AS Origin,
    d.IataCode           AS Destination,
    fd.Distance          AS Distance_km,
    fd.SeatsSold         AS Total_Seats_Sold,
    fd.SeatsSold - fd.CheckInCount AS Total_No_Show,
    (CAST(strftime('%s', fd.ArrivalTime) AS INTEGER)
        - CAST(strftime('%s', fd.DepartureTime) AS INTEGER)) / 60 AS FlightDurationMinutes,
    CAST(strftime('%m', fd.DepartureTime) AS INTEGER) AS Departure_Month,
    CAST(strftime('%w', fd.DepartureTime) AS INTEGER) AS Departure_Weekday,
    CAST(strftime('%H', fd.DepartureTime) AS INTEGER) AS Departure_Hour
FROM flightdetails fd
JOIN aircraft ac ON ac.Id = fd.AircraftId
JOIN airports o  ON o.Id  = fd.OriginAirportId
JOIN airports d  ON d.Id  = fd.DestinationAirportId
WHERE fd.Probability IS NULL"#;

pub fn target() -> TargetTable {
    TargetTable {
        table: "flightdetails",
        key_column: "Id",
        key_kind: KeyKind::Integer,
        prediction_column: "Probability",
        prediction_type: "REAL",
    }
}

pub fn feature_schema() -> FeatureSchema {
    FeatureSchema::new(vec![
        FeatureColumn::numeric("Distance_km"),
        FeatureColumn::numeric("FlightDurationMinutes"),
        FeatureColumn::numeric("Flight_Capacity"),
        FeatureColumn::numeric("Total_Seats_Sold"),
        FeatureColumn::numeric("Frequent_Flyer_Ratio"),
        FeatureColumn::numeric("Last_Min_Bookings"),
        FeatureColumn::numeric("Total_No_Show"),
        FeatureColumn::numeric("Departure_Month"),
        FeatureColumn::numeric("Departure_Weekday"),
        FeatureColumn::numeric("Departure_Hour"),
        FeatureColumn::numeric("Weather_Impact"),
        FeatureColumn::categorical("Airline"),
        FeatureColumn::categorical("Origin"),
        FeatureColumn::categorical("Destination"),
    ])
}

pub fn spec() -> PipelineSpec {
    PipelineSpec {
        name: "flights",
        entity: "Flight",
        id_field: "flight_id",
        value_field: "probability",
        target: target(),
        select_sql: SELECT_SQL,
        key_expr: "fd.Id",
        key_alias: "FlightID",
        remaps: Vec::new(),
        defaults: vec![
            ("Frequent_Flyer_Ratio", DEFAULT_FREQUENT_FLYER_RATIO.into()),
            (
                "Last_Min_Bookings",
                FeatureValue::from(DEFAULT_LAST_MIN_BOOKINGS),
            ),
            ("Weather_Impact", FeatureValue::from(DEFAULT_WEATHER_IMPACT)),
        ],
        schema: feature_schema(),
        transform: ValueTransform::ShowProbabilityPercent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{ScoreKind, Scorer, ScoringArtifact};

    #[test]
    fn test_placeholder_constants() {
        assert_eq!(DEFAULT_FREQUENT_FLYER_RATIO, 0.25);
        assert_eq!(DEFAULT_LAST_MIN_BOOKINGS, 60);
        assert_eq!(DEFAULT_WEATHER_IMPACT, 0);
    }

    #[test]
    fn test_sample_artifact_matches_schema() {
        let artifact =
            ScoringArtifact::from_json(include_str!("../../models/flight_no_show_pipeline.json"))
                .unwrap();

        assert_eq!(artifact.schema(), &feature_schema());
        assert_eq!(artifact.output(), ScoreKind::Value);
    }
}
