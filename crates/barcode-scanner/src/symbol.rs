//! Decoded symbols and the `"BarCodeRead"` event payload

use serde::{Deserialize, Serialize};

/// Name of the event published for every decoded frame
pub const BAR_CODE_READ_EVENT: &str = "BarCodeRead";

/// Corner point in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// One decoder result. Published immediately and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSymbol {
    /// Raw decoded text
    pub raw_value: String,
    /// Format code, see [`crate::format`]
    pub format: i32,
    /// Corner points in decoder order; may be empty
    pub corner_points: Vec<Point>,
}

/// Point as carried in the event: coordinates serialized as text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundsPoint {
    pub x: String,
    pub y: String,
}

/// Payload of the `"BarCodeRead"` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarCodeRead {
    pub bounds: Vec<BoundsPoint>,
    pub data: String,
    #[serde(rename = "type")]
    pub format: i32,
}

impl From<&DecodedSymbol> for BarCodeRead {
    fn from(symbol: &DecodedSymbol) -> Self {
        Self {
            bounds: symbol
                .corner_points
                .iter()
                .map(|p| BoundsPoint {
                    x: p.x.to_string(),
                    y: p.y.to_string(),
                })
                .collect(),
            data: symbol.raw_value.clone(),
            format: symbol.format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format;
    use proptest::prelude::*;

    #[test]
    fn test_payload_shape() {
        let symbol = DecodedSymbol {
            raw_value: "hello".to_string(),
            format: format::QR_CODE,
            corner_points: vec![Point { x: 1, y: 2 }, Point { x: -3, y: 40 }],
        };

        let json = serde_json::to_value(BarCodeRead::from(&symbol)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "bounds": [{"x": "1", "y": "2"}, {"x": "-3", "y": "40"}],
                "data": "hello",
                "type": 256
            })
        );
    }

    #[test]
    fn test_symbol_without_corners_has_empty_bounds() {
        let symbol = DecodedSymbol {
            raw_value: String::new(),
            format: format::DATA_MATRIX,
            corner_points: Vec::new(),
        };
        let payload = BarCodeRead::from(&symbol);
        assert!(payload.bounds.is_empty());
        assert_eq!(payload.format, 16);
    }

    proptest! {
        #[test]
        fn prop_bounds_keep_corner_order(
            corners in prop::collection::vec((any::<i32>(), any::<i32>()), 0..8),
            text in ".*",
        ) {
            let symbol = DecodedSymbol {
                raw_value: text.clone(),
                format: format::QR_CODE,
                corner_points: corners.iter().map(|&(x, y)| Point { x, y }).collect(),
            };
            let payload = BarCodeRead::from(&symbol);

            prop_assert_eq!(payload.data, text);
            prop_assert_eq!(payload.bounds.len(), corners.len());
            for (bound, (x, y)) in payload.bounds.iter().zip(corners) {
                prop_assert_eq!(bound.x.parse::<i32>().unwrap(), x);
                prop_assert_eq!(bound.y.parse::<i32>().unwrap(), y);
            }
        }
    }
}
