use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

pub(crate) fn format_optional(value: Option<PrimitiveDateTime>) -> Option<String> {
    value.map(format_primitive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn format_primitive_outputs_utc_z() {
        assert_eq!(format_primitive(datetime!(2025-01-02 10:20:30)), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn format_optional_passes_none_through() {
        assert_eq!(format_optional(None), None);
        assert_eq!(
            format_optional(Some(datetime!(2025-06-30 23:59:59))).as_deref(),
            Some("2025-06-30T23:59:59Z")
        );
    }
}
