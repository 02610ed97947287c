//! Vendor response envelope: `{"status": "ok", "body": <payload>, ...}`.

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

const PREVIEW_LIMIT: usize = 128;

/// Step of envelope decoding that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodeStep {
	/// The response was not a JSON object.
	OuterParse,
	/// The object had no `body` field.
	MissingField,
	/// `body` did not match the requested shape.
	InnerDecode,
}
impl DecodeStep {
	/// Returns a stable label for the step.
	pub const fn as_str(self) -> &'static str {
		match self {
			DecodeStep::OuterParse => "outer parse",
			DecodeStep::MissingField => "missing field",
			DecodeStep::InnerDecode => "inner decode",
		}
	}
}
impl Display for DecodeStep {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Envelope decoding failures.
#[derive(Debug, ThisError)]
pub enum EnvelopeError {
	/// The response body is not a JSON object.
	#[error("Envelope outer parse failed.")]
	OuterParse {
		/// Underlying JSON error.
		#[source]
		source: serde_json::Error,
	},
	/// The envelope lacks the payload field.
	#[error("Envelope missing field `{field}`: {preview}.")]
	MissingField {
		/// Name of the absent field.
		field: &'static str,
		/// Truncated copy of the received envelope.
		preview: String,
	},
	/// The payload does not match the requested shape.
	#[error("Envelope inner decode failed at `{path}`.", path = .source.path())]
	InnerDecode {
		/// Structured decoding failure, including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl EnvelopeError {
	/// Step that produced the failure.
	pub fn step(&self) -> DecodeStep {
		match self {
			Self::OuterParse { .. } => DecodeStep::OuterParse,
			Self::MissingField { .. } => DecodeStep::MissingField,
			Self::InnerDecode { .. } => DecodeStep::InnerDecode,
		}
	}
}

/// Parsed top-level object.
#[derive(Debug)]
pub struct Envelope {
	fields: Map<String, Value>,
	preview: String,
}
impl Envelope {
	/// Field holding the payload.
	pub const BODY: &'static str = "body";
	const STATUS: &'static str = "status";

	/// Parses the outer object.
	pub fn parse(raw: &[u8]) -> Result<Self, EnvelopeError> {
		let fields = serde_json::from_slice::<Map<String, Value>>(raw)
			.map_err(|source| EnvelopeError::OuterParse { source })?;

		Ok(Self { fields, preview: preview(raw) })
	}

	/// Vendor `status` field, when present as a string.
	pub fn status(&self) -> Option<String> {
		self.field(Self::STATUS).and_then(Value::as_str).map(str::to_owned)
	}

	/// Value of an arbitrary top-level field.
	pub fn field(&self, name: &str) -> Option<&Value> {
		self.fields.get(name)
	}

	/// Decodes `body` into `T`.
	pub fn into_body<T>(mut self) -> Result<T, EnvelopeError>
	where
		T: DeserializeOwned,
	{
		let Some(body) = self.fields.remove(Self::BODY) else {
			return Err(EnvelopeError::MissingField { field: Self::BODY, preview: self.preview });
		};

		serde_path_to_error::deserialize(body).map_err(|source| EnvelopeError::InnerDecode { source })
	}
}

/// Parses `raw` as an envelope and decodes its `body` into `T`.
pub fn decode<T>(raw: &[u8]) -> Result<T, EnvelopeError>
where
	T: DeserializeOwned,
{
	Envelope::parse(raw)?.into_body()
}

fn preview(raw: &[u8]) -> String {
	let text = String::from_utf8_lossy(raw);
	let text = text.trim();

	match text.char_indices().nth(PREVIEW_LIMIT) {
		Some((cut, _)) => format!("{}...", &text[..cut]),
		None => text.to_owned(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, Deserialize)]
	struct Reading {
		temperature: f64,
	}

	#[test]
	fn body_decodes_into_target_shape() {
		let reading: Reading =
			decode(br#"{"body": {"temperature": 21.5}}"#).expect("Envelope should decode.");

		assert_eq!(reading.temperature, 21.5);

		let value: serde_json::Value = decode(br#"{"status":"ok","body":[1,2],"time_exec":0.01}"#)
			.expect("Untyped payload should decode.");

		assert_eq!(value, serde_json::json!([1, 2]));
	}

	#[test]
	fn missing_body_names_the_step() {
		let err = decode::<Reading>(br#"{"status":"error"}"#).expect_err("Missing body must fail.");

		assert_eq!(err.step(), DecodeStep::MissingField);
		assert!(err.step().to_string().contains("missing field"));
		assert!(err.to_string().contains("missing field"), "{err}");
		assert!(err.to_string().contains("\"status\":\"error\""));
	}

	#[test]
	fn outer_parse_rejects_non_objects() {
		let cases: [&[u8]; 3] = [b"not json", b"[1,2,3]", b""];

		for raw in cases {
			let err = decode::<Reading>(raw).expect_err("Non-object envelopes must fail.");

			assert_eq!(err.step(), DecodeStep::OuterParse);
		}
	}

	#[test]
	fn inner_decode_reports_json_path() {
		let err = decode::<Reading>(br#"{"body": {"temperature": "warm"}}"#)
			.expect_err("Mistyped payload must fail.");

		assert_eq!(err.step(), DecodeStep::InnerDecode);
		assert!(err.to_string().contains("temperature"), "{err}");
	}

	#[test]
	fn envelope_exposes_status_and_fields() {
		let envelope = Envelope::parse(br#"{"status":"ok","time_server":1700000000,"body":{}}"#)
			.expect("Envelope should parse.");

		assert_eq!(envelope.status().as_deref(), Some("ok"));
		assert_eq!(envelope.field("time_server").and_then(Value::as_u64), Some(1_700_000_000));
		assert!(envelope.field("missing").is_none());
	}

	#[test]
	fn preview_is_truncated() {
		let long = format!("{{\"status\":\"{}\"}}", "x".repeat(400));
		let err = decode::<Reading>(long.as_bytes()).expect_err("Missing body must fail.");

		match err {
			EnvelopeError::MissingField { preview, .. } => {
				assert!(preview.ends_with("..."));
				assert_eq!(preview.chars().count(), PREVIEW_LIMIT + 3);
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
