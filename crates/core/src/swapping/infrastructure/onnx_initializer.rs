//! Graph initializer access for ONNX models.
//!
//! The swap model stores its identity projection matrix (`emap`) as the last
//! initializer of the graph rather than as an input, and ONNX Runtime does not
//! expose initializers, so the model protobuf is decoded directly.

use std::fs;
use std::path::Path;

use prost::Message;
use tract_onnx::pb;

/// A float tensor read from the model file.
#[derive(Clone, Debug, PartialEq)]
pub struct FloatInitializer {
    pub name: String,
    pub dims: Vec<usize>,
    pub values: Vec<f32>,
}

/// Read the last graph initializer of the ONNX model at `path`.
pub fn read_last_initializer(path: &Path) -> Result<FloatInitializer, Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    last_initializer(&bytes)
}

/// Decode the last initializer from serialized `ModelProto` bytes.
pub fn last_initializer(model: &[u8]) -> Result<FloatInitializer, Box<dyn std::error::Error>> {
    let proto = pb::ModelProto::decode(model)?;
    let graph = proto.graph.ok_or("ONNX model has no graph")?;
    let tensor = graph
        .initializer
        .last()
        .ok_or("ONNX graph has no initializers")?;
    float_initializer(tensor)
}

fn float_initializer(
    proto: &pb::TensorProto,
) -> Result<FloatInitializer, Box<dyn std::error::Error>> {
    use pb::tensor_proto::DataType;

    let name = proto.name.clone();
    if proto.data_type != DataType::Float as i32 {
        return Err(format!(
            "initializer '{name}' has data type {}, expected float",
            proto.data_type
        )
        .into());
    }

    let dims = proto
        .dims
        .iter()
        .map(|&d| usize::try_from(d).map_err(|_| format!("initializer '{name}' has dimension {d}")))
        .collect::<Result<Vec<_>, _>>()?;

    let values = if !proto.raw_data.is_empty() {
        if proto.raw_data.len() % 4 != 0 {
            return Err(format!("initializer '{name}' raw data is not a multiple of 4 bytes").into());
        }
        proto
            .raw_data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    } else if !proto.float_data.is_empty() {
        proto.float_data.clone()
    } else {
        return Err(format!("initializer '{name}' has no data payload").into());
    };

    let expected: usize = dims.iter().product();
    if values.len() != expected {
        return Err(format!(
            "initializer '{name}' has {} values, dims {dims:?} need {expected}",
            values.len()
        )
        .into());
    }

    Ok(FloatInitializer { name, dims, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pb::tensor_proto::DataType;

    fn raw_tensor(name: &str, dims: &[i64], values: &[f32]) -> pb::TensorProto {
        pb::TensorProto {
            name: name.to_string(),
            dims: dims.to_vec(),
            data_type: DataType::Float as i32,
            raw_data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
            ..Default::default()
        }
    }

    fn model_with(initializers: Vec<pb::TensorProto>) -> Vec<u8> {
        pb::ModelProto {
            ir_version: 8,
            graph: Some(pb::GraphProto {
                name: "main_graph".to_string(),
                initializer: initializers,
                ..Default::default()
            }),
            ..Default::default()
        }
        .encode_to_vec()
    }

    #[test]
    fn test_reads_last_raw_initializer() {
        let model = model_with(vec![
            raw_tensor("conv.weight", &[2], &[9.0, 9.0]),
            raw_tensor("emap", &[2, 2], &[1.0, 2.0, 3.0, 4.0]),
        ]);

        let init = last_initializer(&model).unwrap();

        assert_eq!(init.name, "emap");
        assert_eq!(init.dims, vec![2, 2]);
        assert_eq!(init.values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_reads_float_data() {
        let tensor = pb::TensorProto {
            dims: vec![1, 3],
            data_type: DataType::Float as i32,
            float_data: vec![0.5, -1.0, 2.25],
            ..Default::default()
        };

        let init = last_initializer(&model_with(vec![tensor])).unwrap();

        assert_eq!(init.dims, vec![1, 3]);
        assert_eq!(init.values, vec![0.5, -1.0, 2.25]);
    }

    #[test]
    fn test_missing_graph_is_error() {
        let model = pb::ModelProto {
            ir_version: 8,
            ..Default::default()
        }
        .encode_to_vec();
        let err = last_initializer(&model).unwrap_err();
        assert_eq!(err.to_string(), "ONNX model has no graph");
    }

    #[test]
    fn test_no_initializers_is_error() {
        let err = last_initializer(&model_with(Vec::new())).unwrap_err();
        assert_eq!(err.to_string(), "ONNX graph has no initializers");
    }

    #[test]
    fn test_value_count_must_match_dims() {
        let model = model_with(vec![raw_tensor("emap", &[2, 2], &[1.0, 2.0, 3.0])]);
        assert!(last_initializer(&model).is_err());
    }

    #[test]
    fn test_non_float_tensor_is_error() {
        let tensor = pb::TensorProto {
            dims: vec![1],
            data_type: DataType::Int64 as i32,
            int64_data: vec![3],
            ..Default::default()
        };
        let err = last_initializer(&model_with(vec![tensor])).unwrap_err();
        assert!(err.to_string().contains("expected float"));
    }

    #[test]
    fn test_empty_payload_is_error() {
        let tensor = pb::TensorProto {
            name: "emap".to_string(),
            dims: vec![2],
            data_type: DataType::Float as i32,
            ..Default::default()
        };
        let err = last_initializer(&model_with(vec![tensor])).unwrap_err();
        assert_eq!(err.to_string(), "initializer 'emap' has no data payload");
    }

    #[test]
    fn test_truncated_message_is_error() {
        let model = model_with(vec![raw_tensor("emap", &[1], &[1.0])]);
        assert!(last_initializer(&model[..model.len() - 2]).is_err());
    }

    #[test]
    fn test_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        fs::write(&path, model_with(vec![raw_tensor("emap", &[1, 2], &[7.0, 8.0])])).unwrap();

        let init = read_last_initializer(&path).unwrap();

        assert_eq!(init.values, vec![7.0, 8.0]);
    }
}
