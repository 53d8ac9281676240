//! Fixed values shared by the registry launcher and the scenario.

/// Registry image started by the launcher.
pub const DEFAULT_REGISTRY_IMAGE: &str = "public.ecr.aws/docker/library/registry:2";

/// Base image referenced by the scenario's build context.
pub const DEFAULT_BASE_IMAGE: &str = "public.ecr.aws/docker/library/alpine:latest";

/// Port the registry listens on inside its container.
pub const REGISTRY_CONTAINER_PORT: u16 = 5000;

/// Host name under which the registry is published.
pub const REGISTRY_HOST: &str = "localhost";

/// Mount point of the credential fixture directory inside the registry container.
pub const AUTH_MOUNT_POINT: &str = "/auth";

/// File name of the credential fixture.
pub const HTPASSWD_FILE_NAME: &str = "htpasswd";

/// Realm advertised by the registry's basic-auth challenge.
pub const AUTH_REALM: &str = "Registry Realm";

/// Repository pushed by the logout scenario.
pub const SCENARIO_REPOSITORY: &str = "test-login";

/// Tag pushed by the logout scenario.
pub const SCENARIO_TAG: &str = "tag";

/// File name of the build recipe inside a build context.
pub const BUILD_RECIPE_FILE_NAME: &str = "Dockerfile";

/// Prefix of every scratch directory created by the harness.
pub const SCRATCH_PREFIX: &str = "authgate-";

/// Prefix of registry container names.
pub const REGISTRY_CONTAINER_PREFIX: &str = "authgate-registry-";

/// Default wall-clock bound for a single subject invocation.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Default bound on waiting for the registry to answer HTTP requests.
pub const DEFAULT_REGISTRY_READY_TIMEOUT_SECS: u64 = 30;

/// Default subject binary looked up on `PATH`.
pub const DEFAULT_SUBJECT: &str = "finch";

/// Environment variable overriding the subject binary.
pub const SUBJECT_ENV_VAR: &str = "AUTHGATE_SUBJECT";
