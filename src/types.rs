//! Shared value types: timestamps, movement direction and request status
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// Day-first rendering used by the spreadsheet mirror, e.g. `18/10/2026, 14:05:00`
    pub fn to_pt_br(&self) -> String {
        self.0.format("%d/%m/%Y, %H:%M:%S").to_string()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Direction of a stock movement
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementType {
    #[n(0)]
    Entrada,
    #[n(1)]
    Saida,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entrada => "entrada",
            MovementType::Saida => "saida",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a material request. `Pendente` is the only non-terminal state.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RequestStatus {
    #[n(0)]
    #[default]
    Pendente,
    #[n(1)]
    Atendido,
    #[n(2)]
    NaoAtendido,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pendente)
    }
    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Pendente => "Pendente",
            RequestStatus::Atendido => "Atendido",
            RequestStatus::NaoAtendido => "Não Atendido",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
