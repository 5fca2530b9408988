use super::{DEFAULT_TRACKING_TABLE, Descriptor, TemplateSet};

pub(super) const DESCRIPTOR: Descriptor = Descriptor {
    supports_transactional_ddl: true,
    supports_schemas: false,
    supports_batch_statements: true,
    supports_upsert: true,
    tracking_table_name: DEFAULT_TRACKING_TABLE,
    tracking_schema_name: None,
};

// The database is the file itself: it exists once the connection opens it,
// so the existence check and creation are no-op queries.  SQLite has no
// session user, so the user comes from `${STRATA_APPLIED_BY_USER}`.
pub(super) const TEMPLATES: TemplateSet = TemplateSet {
    check_db_exists: "SELECT 1;",
    create_db: "SELECT 1;",
    create_schema: None,
    check_configured: "
SELECT 1
FROM sqlite_master
WHERE type = 'table'
  AND name = '${STRATA_TABLE_NAME}';
",
    configure: "
CREATE TABLE IF NOT EXISTS ${STRATA_TABLE_NAME} (
  sequence_id INTEGER PRIMARY KEY AUTOINCREMENT,
  version TEXT NOT NULL,
  applied_on_utc TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
  applied_by_user TEXT NOT NULL,
  applied_by_tool TEXT NOT NULL,
  applied_by_tool_version TEXT NOT NULL,
  status TEXT NOT NULL,
  duration_ms INTEGER NOT NULL,
  failed_script_path TEXT NULL,
  failed_script_error TEXT NULL,
  additional_artifacts TEXT NULL,
  CONSTRAINT ix_${STRATA_TABLE_NAME} UNIQUE (version)
);
",
    get_current_version: "
SELECT version
FROM ${STRATA_TABLE_NAME}
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
FROM ${STRATA_TABLE_NAME}
ORDER BY sequence_id;
",
    insert_version: "
INSERT INTO ${STRATA_TABLE_NAME} (
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
  '${STRATA_APPLIED_BY_USER}',
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
UPDATE ${STRATA_TABLE_NAME}
SET
  applied_on_utc = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
  applied_by_user = '${STRATA_APPLIED_BY_USER}',
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
INSERT INTO ${STRATA_TABLE_NAME} (
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
  '${STRATA_APPLIED_BY_USER}',
  '${STRATA_APPLIED_BY_TOOL}',
  '${STRATA_APPLIED_BY_TOOL_VERSION}',
  '${STRATA_STATUS}',
  ${STRATA_DURATION_MS},
  NULLIF('${STRATA_FAILED_SCRIPT_PATH}', ''),
  NULLIF('${STRATA_FAILED_SCRIPT_ERROR}', ''),
  NULLIF('${STRATA_ADDITIONAL_ARTIFACTS}', '')
)
ON CONFLICT (version) DO UPDATE SET
  applied_on_utc = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
  applied_by_user = excluded.applied_by_user,
  applied_by_tool = excluded.applied_by_tool,
  applied_by_tool_version = excluded.applied_by_tool_version,
  status = excluded.status,
  duration_ms = excluded.duration_ms,
  failed_script_path = excluded.failed_script_path,
  failed_script_error = excluded.failed_script_error,
  additional_artifacts = excluded.additional_artifacts
WHERE ${STRATA_TABLE_NAME}.status = 'Failed';
",
    ),
};
