//! Offloading of input literal maps to the content store.

use crate::domain::execution::WorkflowExecution;
use crate::domain::identifier::WorkflowExecutionId;
use crate::domain::literal::LiteralMap;
use crate::error::CoreError;
use admiral_content_store::{ContentStorage, DataReference};

/// Key of the fully resolved inputs
pub const INPUTS_KEY: &str = "inputs";
/// Key of the inputs exactly as the user supplied them
pub const USER_INPUTS_KEY: &str = "user_inputs";

/// Serialize `literals` under `<base>/<prefix>/<project>/<domain>/<name>/<key>`
pub async fn offload_literal_map(
    store: &dyn ContentStorage,
    metadata_prefix: &str,
    execution_id: &WorkflowExecutionId,
    key: &str,
    literals: &LiteralMap,
) -> Result<DataReference, CoreError> {
    let reference = store.construct_reference(&[
        metadata_prefix,
        execution_id.project.as_str(),
        execution_id.domain.as_str(),
        execution_id.name.as_str(),
        key,
    ])?;
    let bytes = serde_json::to_vec(literals)?;
    store.write_opaque(&reference, bytes).await?;
    Ok(reference)
}

/// Read back a literal map written by [`offload_literal_map`]
pub async fn read_literal_map(store: &dyn ContentStorage, reference: &DataReference) -> Result<LiteralMap, CoreError> {
    let bytes = store.read_opaque(reference).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// The user inputs of an execution.
///
/// Offloaded records are read from the store; records that predate offloading
/// keep them inline in the spec.
pub async fn read_user_inputs(store: &dyn ContentStorage, execution: &WorkflowExecution) -> Result<LiteralMap, CoreError> {
    match &execution.user_inputs_uri {
        Some(reference) if !reference.is_empty() => read_literal_map(store, reference).await,
        _ => Ok(execution.spec.inputs.clone().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::literal::Literal;
    use admiral_content_store::InMemoryContentStore;

    #[tokio::test]
    async fn test_offload_round_trip() {
        let store = InMemoryContentStore::new();
        let id = WorkflowExecutionId::new("p", "d", "n");
        let inputs = LiteralMap::new().with("x", Literal::Integer(1));

        let reference = offload_literal_map(&store, "metadata", &id, INPUTS_KEY, &inputs).await.unwrap();

        assert_eq!(reference.as_str(), "mem://admiral/metadata/p/d/n/inputs");
        assert_eq!(read_literal_map(&store, &reference).await.unwrap(), inputs);
    }

    #[tokio::test]
    async fn test_user_inputs_legacy_branch() {
        let store = InMemoryContentStore::new();
        let inline = LiteralMap::new().with("legacy", Literal::Boolean(true));
        let mut execution = WorkflowExecution::default();
        execution.spec.inputs = Some(inline.clone());

        assert_eq!(read_user_inputs(&store, &execution).await.unwrap(), inline);

        let offloaded = LiteralMap::new().with("new", Literal::Integer(2));
        let id = WorkflowExecutionId::new("p", "d", "n");
        execution.user_inputs_uri =
            Some(offload_literal_map(&store, "metadata", &id, USER_INPUTS_KEY, &offloaded).await.unwrap());

        assert_eq!(read_user_inputs(&store, &execution).await.unwrap(), offloaded);
    }
}
