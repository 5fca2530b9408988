use super::{DEFAULT_TRACKING_TABLE, Descriptor, TemplateSet};

pub(super) const DESCRIPTOR: Descriptor = Descriptor {
    supports_transactional_ddl: false,
    supports_schemas: false,
    supports_batch_statements: false,
    supports_upsert: true,
    tracking_table_name: DEFAULT_TRACKING_TABLE,
    tracking_schema_name: None,
};

// The tracking table lives in the connected database, so templates do not
// qualify it with `${STRATA_SCHEMA_NAME}`.
// `ON DUPLICATE KEY UPDATE` has no `WHERE`, so every assignment is guarded on
// the row still being `Failed`, with `status` assigned last.
pub(super) const TEMPLATES: TemplateSet = TemplateSet {
    check_db_exists: "
SELECT 1
FROM INFORMATION_SCHEMA.SCHEMATA
WHERE SCHEMA_NAME = '${STRATA_DB_NAME}';
",
    create_db: "CREATE DATABASE `${STRATA_DB_NAME}`;",
    create_schema: None,
    check_configured: "
SELECT 1
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_SCHEMA = '${STRATA_DB_NAME}'
  AND TABLE_NAME = '${STRATA_TABLE_NAME}';
",
    configure: "
CREATE TABLE IF NOT EXISTS `${STRATA_TABLE_NAME}` (
  sequence_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
  version VARCHAR(512) NOT NULL,
  applied_on_utc TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
  applied_by_user VARCHAR(512) NOT NULL,
  applied_by_tool VARCHAR(512) NOT NULL,
  applied_by_tool_version VARCHAR(512) NOT NULL,
  status VARCHAR(32) NOT NULL,
  duration_ms BIGINT NOT NULL,
  failed_script_path TEXT NULL,
  failed_script_error TEXT NULL,
  additional_artifacts TEXT NULL,
  CONSTRAINT ix_${STRATA_TABLE_NAME} UNIQUE (version)
);
",
    get_current_version: "
SELECT version
FROM `${STRATA_TABLE_NAME}`
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
FROM `${STRATA_TABLE_NAME}`
ORDER BY sequence_id;
",
    insert_version: "
INSERT INTO `${STRATA_TABLE_NAME}` (
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
  CURRENT_USER(),
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
UPDATE `${STRATA_TABLE_NAME}`
SET
  applied_on_utc = CURRENT_TIMESTAMP,
  applied_by_user = CURRENT_USER(),
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
INSERT INTO `${STRATA_TABLE_NAME}` (
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
  CURRENT_USER(),
  '${STRATA_APPLIED_BY_TOOL}',
  '${STRATA_APPLIED_BY_TOOL_VERSION}',
  '${STRATA_STATUS}',
  ${STRATA_DURATION_MS},
  NULLIF('${STRATA_FAILED_SCRIPT_PATH}', ''),
  NULLIF('${STRATA_FAILED_SCRIPT_ERROR}', ''),
  NULLIF('${STRATA_ADDITIONAL_ARTIFACTS}', '')
)
ON DUPLICATE KEY UPDATE
  applied_on_utc = IF(status = 'Failed', CURRENT_TIMESTAMP, applied_on_utc),
  applied_by_user = IF(status = 'Failed', VALUES(applied_by_user), applied_by_user),
  applied_by_tool = IF(status = 'Failed', VALUES(applied_by_tool), applied_by_tool),
  applied_by_tool_version = IF(status = 'Failed', VALUES(applied_by_tool_version), applied_by_tool_version),
  duration_ms = IF(status = 'Failed', VALUES(duration_ms), duration_ms),
  failed_script_path = IF(status = 'Failed', VALUES(failed_script_path), failed_script_path),
  failed_script_error = IF(status = 'Failed', VALUES(failed_script_error), failed_script_error),
  additional_artifacts = IF(status = 'Failed', VALUES(additional_artifacts), additional_artifacts),
  status = IF(status = 'Failed', VALUES(status), status);
",
    ),
};
