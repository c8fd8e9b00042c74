//! Passenger booking pipeline
//!
//! Scores unscored `flightbookingdetails` rows with a class-label model and writes the
//! label to `Prediction`.

use super::{PipelineSpec, Remap, TargetTable, ValueTransform};
use crate::frame::{FeatureColumn, FeatureSchema, FeatureValue, KeyKind};

// Placeholders for features the store does not record
pub const DEFAULT_SEAT_CLASS: &str = "Economy";
pub const DEFAULT_CHECK_IN_METHOD: &str = "Online";
pub const DEFAULT_FLIGHT_STATUS: &str = "On-time";
pub const DEFAULT_DELAY_MINUTES: f64 = 0.0;
pub const DEFAULT_BOOKING_DAYS_IN_ADVANCE: i64 = 0;
pub const DEFAULT_WEATHER_IMPACT: i64 = 0;

const SELECT_SQL: &str = r#"
SELECT
    fbd.Id                AS BookingID,
    ac.Airline            AS Airline,
    o.IataCode            AS Origin,
    d.IataCode            AS Destination,
    fd.FlightStatus       AS Flight_Status,
    CAST(strftime('%Y', fd.DepartureTime) AS INTEGER)
        - CAST(strftime('%Y', au.DateOfBirth) AS INTEGER) AS Age,
    au.Gender             AS Gender,
    fbd.TravelPurpose     AS Travel_Purpose,
    au.MembershipTier     AS MembershipTier,
    fd.Distance           AS Distance_km,
    fd.IsHoliday          AS IsHoliday,
    CAST(strftime('%H', fd.DepartureTime) AS INTEGER) AS Departure_Hour,
    CAST(strftime('%w', fd.DepartureTime) AS INTEGER) AS Departure_Weekday,
    CAST(strftime('%m', fd.DepartureTime) AS INTEGER) AS Departure_Month,
    fbd.FareAmount        AS Price,
    fbd.BaggageAllowance  AS BaggageAllowance
FROM flightbookingdetails fbd
JOIN flightdetails  fd ON fd.Id = fbd.FlightDetailId
JOIN aircraft       ac ON ac.Id = fd.AircraftId
JOIN airports       o  ON o.Id  = fd.OriginAirportId
JOIN airports       d  ON d.Id  = fd.DestinationAirportId
JOIN bookingdetails bd ON bd.Id = fbd.BookingDetailId
JOIN appusers       au ON au.Id = bd.AppUserId
WHERE fbd.Prediction IS NULL"#;

pub fn target() -> TargetTable {
    TargetTable {
        table: "flightbookingdetails",
        key_column: "Id",
        key_kind: KeyKind::Text,
        prediction_column: "Prediction",
        prediction_type: "INTEGER",
    }
}

/// Columns the booking model was trained on, in training order
pub fn feature_schema() -> FeatureSchema {
    FeatureSchema::new(vec![
        FeatureColumn::categorical("Airline"),
        FeatureColumn::categorical("Origin"),
        FeatureColumn::categorical("Destination"),
        FeatureColumn::categorical("Flight_Status"),
        FeatureColumn::numeric("Age"),
        FeatureColumn::categorical("Gender"),
        FeatureColumn::categorical("Travel_Purpose"),
        FeatureColumn::categorical("Seat_Class"),
        FeatureColumn::categorical("MembershipTier"),
        FeatureColumn::categorical("Check_in_Method"),
        FeatureColumn::numeric("Delay_Minutes"),
        FeatureColumn::numeric("Booking_Days_In_Advance"),
        FeatureColumn::numeric("Weather_Impact"),
        FeatureColumn::numeric("Distance_km"),
        FeatureColumn::numeric("IsHoliday"),
        FeatureColumn::numeric("Departure_Hour"),
        FeatureColumn::numeric("Departure_Weekday"),
        FeatureColumn::numeric("Departure_Month"),
        FeatureColumn::numeric("Price"),
        FeatureColumn::numeric("BaggageAllowance"),
    ])
}

pub fn spec() -> PipelineSpec {
    PipelineSpec {
        name: "bookings",
        entity: "Booking",
        id_field: "booking_id",
        value_field: "prediction",
        target: target(),
        select_sql: SELECT_SQL,
        key_expr: "fbd.Id",
        key_alias: "BookingID",
        remaps: vec![
            Remap::map(
                "Gender",
                vec![("M".into(), "Male".into()), ("F".into(), "Female".into())],
            ),
            Remap::map(
                "Travel_Purpose",
                vec![
                    (0i64.into(), "Business".into()),
                    (1i64.into(), "Family".into()),
                    (2i64.into(), "Leisure".into()),
                    (3i64.into(), "Emergency".into()),
                ],
            ),
            Remap::replace("MembershipTier", vec![("Normal".into(), "None".into())]),
        ],
        defaults: vec![
            ("Seat_Class", DEFAULT_SEAT_CLASS.into()),
            ("Check_in_Method", DEFAULT_CHECK_IN_METHOD.into()),
            ("Flight_Status", DEFAULT_FLIGHT_STATUS.into()),
            ("Delay_Minutes", DEFAULT_DELAY_MINUTES.into()),
            (
                "Booking_Days_In_Advance",
                FeatureValue::from(DEFAULT_BOOKING_DAYS_IN_ADVANCE),
            ),
            ("Weather_Impact", FeatureValue::from(DEFAULT_WEATHER_IMPACT)),
        ],
        schema: feature_schema(),
        transform: ValueTransform::ClassLabel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{ScoreKind, Scorer, ScoringArtifact};

    #[test]
    fn test_placeholder_constants() {
        assert_eq!(DEFAULT_SEAT_CLASS, "Economy");
        assert_eq!(DEFAULT_CHECK_IN_METHOD, "Online");
        assert_eq!(DEFAULT_FLIGHT_STATUS, "On-time");
        assert_eq!(DEFAULT_DELAY_MINUTES, 0.0);
        assert_eq!(DEFAULT_BOOKING_DAYS_IN_ADVANCE, 0);
        assert_eq!(DEFAULT_WEATHER_IMPACT, 0);
    }

    #[test]
    fn test_schema_has_twenty_unique_columns() {
        let schema = feature_schema();
        let mut names = schema.names();
        assert_eq!(names.len(), 20);
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 20);
    }

    #[test]
    fn test_sample_artifact_matches_schema() {
        let artifact =
            ScoringArtifact::from_json(include_str!("../../models/rf_pipeline.json")).unwrap();

        assert_eq!(artifact.schema(), &feature_schema());
        assert_eq!(artifact.output(), ScoreKind::ClassLabel);
    }
}
