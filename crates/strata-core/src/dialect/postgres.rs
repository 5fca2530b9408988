use super::{DEFAULT_TRACKING_TABLE, Descriptor, TemplateSet};

pub(super) const DESCRIPTOR: Descriptor = Descriptor {
    supports_transactional_ddl: true,
    supports_schemas: true,
    supports_batch_statements: true,
    supports_upsert: true,
    tracking_table_name: DEFAULT_TRACKING_TABLE,
    tracking_schema_name: Some("public"),
};

pub(super) const TEMPLATES: TemplateSet = TemplateSet {
    check_db_exists: "SELECT 1 FROM pg_database WHERE datname = '${STRATA_DB_NAME}';",
    create_db: "CREATE DATABASE \"${STRATA_DB_NAME}\";",
    create_schema: Some("CREATE SCHEMA IF NOT EXISTS ${STRATA_SCHEMA_NAME};"),
    check_configured: "
SELECT 1
FROM information_schema.tables
WHERE table_schema = '${STRATA_SCHEMA_NAME}'
  AND table_name = '${STRATA_TABLE_NAME}';
",
    configure: "
CREATE TABLE IF NOT EXISTS ${STRATA_SCHEMA_NAME}.${STRATA_TABLE_NAME} (
  sequence_id BIGSERIAL NOT NULL PRIMARY KEY,
  version VARCHAR(512) NOT NULL,
  applied_on_utc TIMESTAMPTZ NOT NULL DEFAULT now(),
  applied_by_user VARCHAR(512) NOT NULL DEFAULT current_user,
  applied_by_tool VARCHAR(512) NOT NULL,
  applied_by_tool_version VARCHAR(512) NOT NULL,
  status VARCHAR(32) NOT NULL,
  duration_ms BIGINT NOT NULL,
  failed_script_path VARCHAR(4000) NULL,
  failed_script_error VARCHAR(4000) NULL,
  additional_artifacts TEXT NULL,
  CONSTRAINT ix_${STRATA_TABLE_NAME} UNIQUE (version)
);
",
    get_current_version: "
SELECT version
FROM ${STRATA_SCHEMA_NAME}.${STRATA_TABLE_NAME}
WHERE status = 'Successful'
ORDER BY sequence_id DESC
LIMIT 1;
",
    get_all_versions: "
SELECT
  sequence_id,
  version,
  applied_on_utc,
  applied_by_user,
  applied_by_tool,
  applied_by_tool_version,
  status,
  duration_ms,
  failed_script_path,
  failed_script_error,
  additional_artifacts
FROM ${STRATA_SCHEMA_NAME}.${STRATA_TABLE_NAME}
ORDER BY sequence_id;
",
    insert_version: "
INSERT INTO ${STRATA_SCHEMA_NAME}.${STRATA_TABLE_NAME} (
  version,
  applied_by_user,
  applied_by_tool,
  applied_by_tool_version,
  status,
  duration_ms,
  failed_script_path,
  failed_script_error,
  additional_artifacts
) VALUES (
  '${STRATA_VERSION}',
  current_user,
  '${STRATA_APPLIED_BY_TOOL}',
  '${STRATA_APPLIED_BY_TOOL_VERSION}',
  '${STRATA_STATUS}',
  ${STRATA_DURATION_MS},
  NULLIF('${STRATA_FAILED_SCRIPT_PATH}', ''),
  NULLIF('${STRATA_FAILED_SCRIPT_ERROR}', ''),
  NULLIF('${STRATA_ADDITIONAL_ARTIFACTS}', '')
);
",
    update_version: "
UPDATE ${STRATA_SCHEMA_NAME}.${STRATA_TABLE_NAME}
SET
  applied_on_utc = now(),
  applied_by_user = current_user,
  applied_by_tool = '${STRATA_APPLIED_BY_TOOL}',
  applied_by_tool_version = '${STRATA_APPLIED_BY_TOOL_VERSION}',
  status = '${STRATA_STATUS}',
  duration_ms = ${STRATA_DURATION_MS},
  failed_script_path = NULLIF('${STRATA_FAILED_SCRIPT_PATH}', ''),
  failed_script_error = NULLIF('${STRATA_FAILED_SCRIPT_ERROR}', ''),
  additional_artifacts = NULLIF('${STRATA_ADDITIONAL_ARTIFACTS}', '')
WHERE version = '${STRATA_VERSION}'
  AND status = 'Failed';
",
    upsert_version: Some(
        "
INSERT INTO ${STRATA_SCHEMA_NAME}.${STRATA_TABLE_NAME} (
  version,
  applied_by_user,
  applied_by_tool,
  applied_by_tool_version,
  status,
  duration_ms,
  failed_script_path,
  failed_script_error,
  additional_artifacts
) VALUES (
  '${STRATA_VERSION}',
  current_user,
  '${STRATA_APPLIED_BY_TOOL}',
  '${STRATA_APPLIED_BY_TOOL_VERSION}',
  '${STRATA_STATUS}',
  ${STRATA_DURATION_MS},
  NULLIF('${STRATA_FAILED_SCRIPT_PATH}', ''),
  NULLIF('${STRATA_FAILED_SCRIPT_ERROR}', ''),
  NULLIF('${STRATA_ADDITIONAL_ARTIFACTS}', '')
)
ON CONFLICT (version) DO UPDATE SET
  applied_on_utc = now(),
  applied_by_user = EXCLUDED.applied_by_user,
  applied_by_tool = EXCLUDED.applied_by_tool,
  applied_by_tool_version = EXCLUDED.applied_by_tool_version,
  status = EXCLUDED.status,
  duration_ms = EXCLUDED.duration_ms,
  failed_script_path = EXCLUDED.failed_script_path,
  failed_script_error = EXCLUDED.failed_script_error,
  additional_artifacts = EXCLUDED.additional_artifacts
WHERE ${STRATA_SCHEMA_NAME}.${STRATA_TABLE_NAME}.status = 'Failed';
",
    ),
};
