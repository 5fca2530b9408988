use super::{DEFAULT_TRACKING_TABLE, Descriptor, TemplateSet};

pub(super) const DESCRIPTOR: Descriptor = Descriptor {
    supports_transactional_ddl: true,
    supports_schemas: true,
    supports_batch_statements: false,
    supports_upsert: false,
    tracking_table_name: DEFAULT_TRACKING_TABLE,
    tracking_schema_name: Some("dbo"),
};

pub(super) const TEMPLATES: TemplateSet = TemplateSet {
    check_db_exists: "SELECT 1 FROM sys.databases WHERE name = N'${STRATA_DB_NAME}';",
    create_db: "CREATE DATABASE [${STRATA_DB_NAME}];",
    create_schema: Some(
        "
IF NOT EXISTS (SELECT 1 FROM sys.schemas WHERE name = N'${STRATA_SCHEMA_NAME}')
BEGIN
  EXEC('CREATE SCHEMA [${STRATA_SCHEMA_NAME}]');
END;
",
    ),
    check_configured: "
SELECT 1
FROM sys.tables t
INNER JOIN sys.schemas s ON s.schema_id = t.schema_id
WHERE s.name = N'${STRATA_SCHEMA_NAME}'
  AND t.name = N'${STRATA_TABLE_NAME}';
",
    configure: "
IF OBJECT_ID(N'[${STRATA_SCHEMA_NAME}].[${STRATA_TABLE_NAME}]', N'U') IS NULL
BEGIN
  CREATE TABLE [${STRATA_SCHEMA_NAME}].[${STRATA_TABLE_NAME}] (
    sequence_id BIGINT IDENTITY(1,1) NOT NULL PRIMARY KEY,
    version NVARCHAR(512) NOT NULL,
    applied_on_utc DATETIME2 NOT NULL DEFAULT GETUTCDATE(),
    applied_by_user NVARCHAR(512) NOT NULL DEFAULT SUSER_SNAME(),
    applied_by_tool NVARCHAR(512) NOT NULL,
    applied_by_tool_version NVARCHAR(512) NOT NULL,
    status NVARCHAR(32) NOT NULL,
    duration_ms BIGINT NOT NULL,
    failed_script_path NVARCHAR(4000) NULL,
    failed_script_error NVARCHAR(4000) NULL,
    additional_artifacts NVARCHAR(MAX) NULL,
    CONSTRAINT ix_${STRATA_TABLE_NAME} UNIQUE (version)
  );
END;
",
    get_current_version: "
SELECT TOP 1 version
FROM [${STRATA_SCHEMA_NAME}].[${STRATA_TABLE_NAME}]
WHERE status = 'Successful'
ORDER BY sequence_id DESC;
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
FROM [${STRATA_SCHEMA_NAME}].[${STRATA_TABLE_NAME}]
ORDER BY sequence_id;
",
    insert_version: "
INSERT INTO [${STRATA_SCHEMA_NAME}].[${STRATA_TABLE_NAME}] (
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
  N'${STRATA_VERSION}',
  SUSER_SNAME(),
  N'${STRATA_APPLIED_BY_TOOL}',
  N'${STRATA_APPLIED_BY_TOOL_VERSION}',
  N'${STRATA_STATUS}',
  ${STRATA_DURATION_MS},
  NULLIF(N'${STRATA_FAILED_SCRIPT_PATH}', N''),
  NULLIF(N'${STRATA_FAILED_SCRIPT_ERROR}', N''),
  NULLIF(N'${STRATA_ADDITIONAL_ARTIFACTS}', N'')
);
",
    update_version: "
UPDATE [${STRATA_SCHEMA_NAME}].[${STRATA_TABLE_NAME}]
SET
  applied_on_utc = GETUTCDATE(),
  applied_by_user = SUSER_SNAME(),
  applied_by_tool = N'${STRATA_APPLIED_BY_TOOL}',
  applied_by_tool_version = N'${STRATA_APPLIED_BY_TOOL_VERSION}',
  status = N'${STRATA_STATUS}',
  duration_ms = ${STRATA_DURATION_MS},
  failed_script_path = NULLIF(N'${STRATA_FAILED_SCRIPT_PATH}', N''),
  failed_script_error = NULLIF(N'${STRATA_FAILED_SCRIPT_ERROR}', N''),
  additional_artifacts = NULLIF(N'${STRATA_ADDITIONAL_ARTIFACTS}', N'')
WHERE version = N'${STRATA_VERSION}'
  AND status = N'Failed';
",
    upsert_version: None,
};
