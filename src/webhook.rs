use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize, Serializer};

use u50_protocol::{Label, NormalizedValues};

use crate::error::{Result, TelemetryError};

/// Number of output slots (`d1`..`d12`).
pub const SLOT_COUNT: usize = 12;
/// Slots `d1..=d5` go into the critical group.
pub const CRITICAL_SLOTS: u8 = 5;

pub const CRITICAL_GROUP: &str = "critical";
pub const NON_CRITICAL_GROUP: &str = "non-critical";

/// Parameter enumeration that field map indices refer to.
///
/// Same labels as the normalizer, but `m` comes before `O' T`.
pub const PARAMETER_NAMES: [Label; SLOT_COUNT] = [
    Label::Temperature,
    Label::Ph,
    Label::PhMv,
    Label::Orp,
    Label::Conductivity,
    Label::Turbidity,
    Label::DissolvedOxygen,
    Label::Tds,
    Label::Salinity,
    Label::Depth,
    Label::SigmaT,
    Label::DoSaturation,
];

/// An output slot, `d1` through `d12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u8);

impl Slot {
    pub fn new(number: u8) -> Option<Self> {
        (1..=SLOT_COUNT as u8).contains(&number).then_some(Self(number))
    }

    pub fn all() -> impl Iterator<Item = Slot> {
        (1..=SLOT_COUNT as u8).map(Slot)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize - 1
    }

    pub fn is_critical(self) -> bool {
        self.0 <= CRITICAL_SLOTS
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

impl FromStr for Slot {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix('d')
            .and_then(|n| n.parse().ok())
            .and_then(Slot::new)
            .ok_or_else(|| TelemetryError::Config(format!("unknown output slot {s:?}")))
    }
}

/// A field map entry as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldRef {
    Index(usize),
    Label(String),
}

impl FieldRef {
    fn resolve(&self) -> Result<usize> {
        match self {
            FieldRef::Index(i) if *i < SLOT_COUNT => Ok(*i),
            FieldRef::Index(i) => Err(TelemetryError::Config(format!(
                "parameter index {i} out of range 0..{SLOT_COUNT}"
            ))),
            FieldRef::Label(name) => Label::from_name(name)
                .and_then(|label| PARAMETER_NAMES.iter().position(|l| *l == label))
                .ok_or_else(|| TelemetryError::Config(format!("unknown parameter {name:?}"))),
        }
    }
}

/// Which parameter feeds each output slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, FieldRef>")]
pub struct FieldMap {
    indices: [usize; SLOT_COUNT],
}

impl Default for FieldMap {
    /// `dN` takes parameter `N - 1`.
    fn default() -> Self {
        Self {
            indices: std::array::from_fn(|i| i),
        }
    }
}

impl FieldMap {
    /// Point `slot` at entry `index` of [`PARAMETER_NAMES`].
    pub fn set(&mut self, slot: Slot, index: usize) -> Result<()> {
        self.indices[slot.index()] = FieldRef::Index(index).resolve()?;
        Ok(())
    }

    pub fn label(&self, slot: Slot) -> Label {
        PARAMETER_NAMES[self.indices[slot.index()]]
    }
}

impl TryFrom<BTreeMap<String, FieldRef>> for FieldMap {
    type Error = TelemetryError;

    fn try_from(entries: BTreeMap<String, FieldRef>) -> Result<Self> {
        let mut map = FieldMap::default();
        for (slot, field) in &entries {
            let slot: Slot = slot.parse()?;
            map.indices[slot.index()] = field.resolve()?;
        }
        Ok(map)
    }
}

/// Slot values of one group, serialized as an ordered `{"dN": value}` object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotValues(Vec<(Slot, f64)>);

impl SlotValues {
    pub fn get(&self, slot: Slot) -> Option<f64> {
        self.0.iter().find(|(s, _)| *s == slot).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SlotValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(slot, value)| (slot.to_string(), value)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadGroup {
    pub name: &'static str,
    pub value: SlotValues,
}

/// Webhook body: a critical and a non-critical group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(Vec<PayloadGroup>);

impl Payload {
    pub fn groups(&self) -> &[PayloadGroup] {
        &self.0
    }

    pub fn value(&self, slot: Slot) -> Option<f64> {
        self.0.iter().find_map(|group| group.value.get(slot))
    }
}

/// Numeric value of a normalized string. Missing, unparsable and
/// non-finite values all become `0.0`.
fn numeric(value: Option<&str>) -> f64 {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Build the webhook body for the current normalized values.
pub fn build_payload(map: &FieldMap, values: &NormalizedValues) -> Payload {
    let mut critical = Vec::with_capacity(CRITICAL_SLOTS as usize);
    let mut non_critical = Vec::with_capacity(SLOT_COUNT - CRITICAL_SLOTS as usize);

    for slot in Slot::all() {
        let label = map.label(slot);
        let value = numeric(values.get(label));
        debug!("{slot} <- {label} = {value}");
        if slot.is_critical() {
            critical.push((slot, value));
        } else {
            non_critical.push((slot, value));
        }
    }

    Payload(vec![
        PayloadGroup {
            name: CRITICAL_GROUP,
            value: SlotValues(critical),
        },
        PayloadGroup {
            name: NON_CRITICAL_GROUP,
            value: SlotValues(non_critical),
        },
    ])
}

/// Something that can deliver a payload.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(&self, payload: &Payload) -> impl Future<Output = Result<()>> + Send;
}

/// HTTP POST delivery to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl WebhookClient {
    /// `authorization` is sent verbatim in the `Authorization` header.
    pub fn new(url: impl Into<String>, authorization: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(auth) = authorization {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(auth)?);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            headers,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Dispatch for WebhookClient {
    async fn dispatch(&self, payload: &Payload) -> Result<()> {
        debug!("POST {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!("webhook accepted data ({status})");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_else(|e| {
                warn!("cannot read webhook response body: {e}");
                String::new()
            });
            Err(TelemetryError::WebhookStatus { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn values(pairs: &[(Label, &str)]) -> NormalizedValues {
        pairs
            .iter()
            .map(|(label, value)| (*label, value.to_string()))
            .collect()
    }

    fn slot(n: u8) -> Slot {
        Slot::new(n).unwrap()
    }

    #[test]
    fn test_slot_parse_and_display() {
        assert_eq!("d1".parse::<Slot>().unwrap(), slot(1));
        assert_eq!("d12".parse::<Slot>().unwrap().to_string(), "d12");
        assert!("d0".parse::<Slot>().is_err());
        assert!("d13".parse::<Slot>().is_err());
        assert!("x1".parse::<Slot>().is_err());
        assert!(slot(5).is_critical());
        assert!(!slot(6).is_critical());
    }

    #[test]
    fn test_default_map_is_identity() {
        let map = FieldMap::default();
        for (i, s) in Slot::all().enumerate() {
            assert_eq!(map.label(s), PARAMETER_NAMES[i]);
        }
        assert_eq!(map.label(slot(10)), Label::Depth);
        assert_eq!(map.label(slot(11)), Label::SigmaT);
    }

    #[test]
    fn test_payload_default_map() {
        let values = values(&[
            (Label::Temperature, "25.30"),
            (Label::Ph, "7.02"),
            (Label::PhMv, "-60."),
            (Label::Orp, "312"),
            (Label::Conductivity, "0.14"),
            (Label::Turbidity, "12.3"),
            (Label::DissolvedOxygen, "8.76"),
            (Label::Tds, "0.09"),
            (Label::Salinity, "0.07"),
            (Label::SigmaT, "0.00"),
            (Label::Depth, "1.23"),
            (Label::DoSaturation, "99.8"),
        ]);
        let payload = build_payload(&FieldMap::default(), &values);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!([
                {"name": "critical", "value": {
                    "d1": 25.3, "d2": 7.02, "d3": -60.0, "d4": 312.0, "d5": 0.14
                }},
                {"name": "non-critical", "value": {
                    "d6": 12.3, "d7": 8.76, "d8": 0.09, "d9": 0.07,
                    "d10": 1.23, "d11": 0.0, "d12": 99.8
                }}
            ])
        );
    }

    #[test]
    fn test_payload_keeps_slot_order() {
        let payload = build_payload(&FieldMap::default(), &NormalizedValues::default());
        let text = serde_json::to_string(&payload).unwrap();
        let positions: Vec<usize> = Slot::all()
            .map(|s| text.find(&format!("\"{s}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");
        assert!(text.starts_with(r#"[{"name":"critical","value":{"d1":0.0"#));
    }

    #[test]
    fn test_remapped_slot_missing_value_is_zero() {
        let mut map = FieldMap::default();
        map.set(slot(1), 1).unwrap();
        let payload = build_payload(&map, &values(&[(Label::Temperature, "25.30")]));
        assert_eq!(payload.value(slot(1)), Some(0.0));
        assert_eq!(payload.value(slot(2)), Some(0.0));
    }

    #[test]
    fn test_remapped_slot_reads_label() {
        let mut map = FieldMap::default();
        map.set(slot(1), 1).unwrap();
        let payload = build_payload(&map, &values(&[(Label::Ph, "7.02")]));
        assert_eq!(payload.value(slot(1)), Some(7.02));
    }

    #[test]
    fn test_non_numeric_values_are_zero() {
        let payload = build_payload(
            &FieldMap::default(),
            &values(&[
                (Label::Temperature, "abc"),
                (Label::Ph, "nan"),
                (Label::PhMv, "inf"),
                (Label::Orp, "12"),
            ]),
        );
        assert_eq!(payload.value(slot(1)), Some(0.0));
        assert_eq!(payload.value(slot(2)), Some(0.0));
        assert_eq!(payload.value(slot(3)), Some(0.0));
        assert_eq!(payload.value(slot(4)), Some(12.0));
        assert!(serde_json::to_string(&payload).is_ok());
    }

    #[test]
    fn test_map_out_of_range_index() {
        let mut map = FieldMap::default();
        assert!(map.set(slot(1), 12).is_err());
        assert_eq!(map, FieldMap::default());
    }

    #[test]
    fn test_map_from_yaml() {
        let map: FieldMap = serde_yaml::from_str("d1: pH\nd2: 0\nd12: \"O' T\"\n").unwrap();
        assert_eq!(map.label(slot(1)), Label::Ph);
        assert_eq!(map.label(slot(2)), Label::Temperature);
        assert_eq!(map.label(slot(3)), Label::PhMv);
        assert_eq!(map.label(slot(12)), Label::SigmaT);
    }

    #[test]
    fn test_map_from_yaml_rejects_unknowns() {
        assert!(serde_yaml::from_str::<FieldMap>("d1: Chlorophyll\n").is_err());
        assert!(serde_yaml::from_str::<FieldMap>("d13: pH\n").is_err());
        assert!(serde_yaml::from_str::<FieldMap>("d1: 99\n").is_err());
    }

    #[test]
    fn test_invalid_authorization_header() {
        let err = WebhookClient::new("http://localhost", Some("bad\nvalue"), Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidHeader(_)));
    }

    #[tokio::test]
    async fn test_dispatch_posts_json_with_authorization() {
        let server = MockServer::start().await;
        let payload = build_payload(&FieldMap::default(), &values(&[(Label::Temperature, "21.50")]));

        Mock::given(method("POST"))
            .and(path("/api/series/lake/v1"))
            .and(header("authorization", "Bearer secret"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::to_value(&payload).unwrap()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let client = WebhookClient::new(
            format!("{}/api/series/lake/v1", server.uri()),
            Some("Bearer secret"),
            Duration::from_secs(10),
        )
        .unwrap();
        client.dispatch(&payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = WebhookClient::new(server.uri(), None, Duration::from_secs(10)).unwrap();
        let payload = build_payload(&FieldMap::default(), &NormalizedValues::default());
        match client.dispatch(&payload).await.unwrap_err() {
            TelemetryError::WebhookStatus { status, body } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let client = WebhookClient::new(server.uri(), None, Duration::from_millis(100)).unwrap();
        let payload = build_payload(&FieldMap::default(), &NormalizedValues::default());
        let err = client.dispatch(&payload).await.unwrap_err();
        assert!(matches!(err, TelemetryError::Http(_)));
    }
}
