// Curated fuzzing paths, grouped by technology tag. Static data: nothing is fetched.

/// Always fuzzed once fuzzing is enabled, whatever the stack.
pub const COMMON: &[&str] = &[
    // config & secrets
    ".env", ".env.local", ".env.production", ".env.backup", "config.json", "config.yml",
    "settings.json", "secrets.json", "credentials.json",
    // version control
    ".git/HEAD", ".git/config", ".svn/entries", ".hg/hgrc",
    // backups & logs
    "backup/", "backup.zip", "backup.sql", "dump.sql", "database.sql", "old/", "temp/",
    "logs/", "debug.log", "error.log",
    // docs & specs
    "swagger.json", "swagger-ui.html", "api-docs", "openapi.json", "openapi.yaml", "docs/",
    "api/", "api/v1/", "api/v2/", "redoc",
    // admin & auth
    "admin/", "administrator/", "dashboard/", "console/", "manage/", "login", "auth/",
    "oauth/", "register/",
    // users
    "user/", "users/", "account/", "me/",
    // server info
    "server-status", "status", "health", "healthcheck", "ping", "version", "info",
    "metrics",
    // well-known
    "robots.txt", "sitemap.xml", "crossdomain.xml", ".well-known/security.txt",
    ".well-known/openid-configuration",
    // debug & staging
    "debug/", "test/", "dev/", "staging/", "trace.axd",
    // graphql
    "graphql", "graphiql", "playground",
    // internal
    "internal/", "private/", "secret/",
];

const SPRING: &[&str] = &[
    "actuator", "actuator/health", "actuator/info", "actuator/env", "actuator/beans",
    "actuator/configprops", "actuator/mappings", "actuator/metrics", "actuator/loggers",
    "actuator/heapdump", "actuator/threaddump", "actuator/httptrace", "actuator/prometheus",
    "actuator/jolokia", "actuator/logfile", "actuator/shutdown", "actuator/gateway/routes",
    "env", "beans", "mappings", "trace", "dump", "autoconfig", "configprops",
    "h2-console/", "swagger-resources", "v2/api-docs", "v3/api-docs", "druid/index.html",
    "application.properties", "application.yml", "bootstrap.yml",
];

const JAVA: &[&str] = &[
    "WEB-INF/web.xml", "META-INF/MANIFEST.MF", "index.jsp", "admin.jsp", "login.jsp",
    "jmx-console/", "jolokia/", "jolokia/list", "j_security_check", "rest/", "services/",
];

const TOMCAT: &[&str] = &[
    "manager/html", "manager/text", "manager/status", "host-manager/html", "examples/",
    "docs/", "conf/server.xml", "conf/tomcat-users.xml", "RELEASE-NOTES.txt",
];

const JBOSS: &[&str] = &[
    "jmx-console/HtmlAdaptor", "web-console/", "web-console/Invoker", "admin-console/",
    "invoker/JMXInvokerServlet", "invoker/EJBInvokerServlet", "jbossws/services",
    "management/",
];

const DJANGO: &[&str] = &[
    "admin/", "admin/login/", "__debug__/", "silk/", "static/admin/", "api-auth/login/",
    "api-token-auth/", "openapi/", "redoc/", "accounts/login/", "settings.py",
    "manage.py", "requirements.txt", "flower/",
];

const FLASK: &[&str] = &[
    "flask-admin/", "console", "__debugger__", "apidocs/", "swagger.json", "app.py",
    "config.py", "migrations/",
];

const FASTAPI: &[&str] = &[
    "docs", "redoc", "openapi.json", "healthz", "readiness", "liveness", "users/me",
    "token", "alembic.ini",
];

const PHP: &[&str] = &[
    "phpinfo.php", "info.php", "test.php", "debug.php", "status.php", "apc.php",
    "opcache.php", "config.php", "config.php.bak", "config.inc.php", "db.php",
    "database.php", "composer.json", "composer.lock", "vendor/autoload.php", "admin.php",
    "install.php", "setup.php", "upload.php", ".htaccess", "php.ini", ".user.ini",
];

const LARAVEL: &[&str] = &[
    "_debugbar/", "telescope/", "horizon/", "nova/", "sanctum/csrf-cookie",
    "storage/logs/laravel.log", "_ignition/health-check", "_ignition/execute-solution",
    "artisan", ".env.example",
];

const SYMFONY: &[&str] = &[
    "_profiler/", "_profiler/phpinfo", "_profiler/latest", "_wdt/", "_error/",
    "api/docs", "api/graphql", "var/log/", "symfony.lock",
];

const WORDPRESS: &[&str] = &[
    "wp-admin/", "wp-admin/admin-ajax.php", "wp-admin/install.php", "wp-login.php",
    "wp-cron.php", "wp-config.php", "wp-config.php.bak", "wp-config.php~",
    "wp-content/debug.log", "wp-content/uploads/", "wp-content/plugins/",
    "wp-includes/version.php", "wp-json/", "wp-json/wp/v2/users", "wp-json/wp/v2/posts",
    "wp-json/wp/v2/settings", "xmlrpc.php", "readme.html", "license.txt",
];

const DRUPAL: &[&str] = &[
    "user/login", "user/register", "admin/config", "admin/reports/status",
    "admin/reports/dblog", "CHANGELOG.txt", "core/CHANGELOG.txt", "core/install.php",
    "sites/default/settings.php", "sites/default/files/", "update.php", "cron.php",
    "jsonapi/",
];

const NODE: &[&str] = &[
    "package.json", "package-lock.json", "yarn.lock", ".npmrc", "node_modules/",
    "npm-debug.log", "server.js", "app.js", "index.js", "tsconfig.json",
    "webpack.config.js", "ecosystem.config.js", "nodemon.json", ".env.development",
];

const NEXTJS: &[&str] = &[
    "next.config.js", "_next/static/", "_next/data/", "api/health", "api/graphql",
    "api/auth/session", "api/auth/providers", "api/auth/csrf",
];

const RAILS: &[&str] = &[
    "rails/info", "rails/info/properties", "rails/info/routes", "rails/mailers", "cable",
    "rails_admin/", "sidekiq/", "resque/", "flipper/", "blazer/", "users/sign_in",
    "Gemfile", "Gemfile.lock", "config/database.yml", "config/secrets.yml",
    "config/master.key", "log/development.log", "log/production.log",
];

const GO: &[&str] = &[
    "go.mod", "go.sum", "healthz", "readyz", "livez", "debug/pprof/",
    "debug/pprof/goroutine", "debug/pprof/heap", "debug/pprof/profile", "debug/vars",
    "swagger/index.html", "docs/swagger.json",
];

const ASPNET: &[&str] = &[
    "web.config", "Web.config", "Global.asax", "trace.axd", "elmah.axd", "glimpse.axd",
    "default.aspx", "login.aspx", "admin.aspx", "App_Data/", "bin/", "appsettings.json",
    "appsettings.Development.json", "swagger/v1/swagger.json", "Account/Login",
    "signalr/", "hangfire",
];

const IIS: &[&str] = &[
    "iisstart.htm", "aspnet_client/", "_vti_bin/", "_vti_inf.html", "_vti_pvt/",
    "cgi-bin/",
];

const APACHE: &[&str] = &[
    "server-status", "server-info", "balancer-manager", ".htaccess", ".htpasswd",
    "cgi-bin/printenv", "cgi-bin/test-cgi", "icons/", "manual/",
];

const NGINX: &[&str] = &["nginx_status", "nginx-status", "stub_status", "nginx.conf", "50x.html"];

const LIFERAY: &[&str] = &[
    "api/jsonws", "api/jsonws/invoke", "api/axis/", "c/portal/login",
    "c/portal/json_service", "group/control_panel", "web/guest/home",
    "documents/portlet_file_entry/",
];

const SWAGGER: &[&str] = &[
    "swagger/", "swagger-ui/", "swagger/index.html", "api/swagger.json",
    "api/swagger/v1/swagger.json", "swagger-resources/configuration/ui", "openapi.yml",
    "api/openapi.json", "v1/api-docs", "v2/api-docs", "v3/api-docs", "api/v1/docs",
    "rapidoc", "altair", "voyager",
];

/// Tags with a wordlist, with the lists each one expands to.
static TAG_LISTS: &[(&str, &[&[&str]])] = &[
    ("spring", &[SPRING]),
    ("java", &[JAVA, SPRING]),
    ("tomcat", &[TOMCAT, JAVA]),
    ("jboss", &[JBOSS, JAVA]),
    ("django", &[DJANGO]),
    ("flask", &[FLASK]),
    ("fastapi", &[FASTAPI]),
    ("python", &[DJANGO, FLASK, FASTAPI]),
    ("php", &[PHP]),
    ("laravel", &[LARAVEL, PHP]),
    ("symfony", &[SYMFONY, PHP]),
    ("wordpress", &[WORDPRESS, PHP]),
    ("drupal", &[DRUPAL, PHP]),
    ("node", &[NODE]),
    ("nextjs", &[NEXTJS, NODE]),
    ("rails", &[RAILS]),
    ("go", &[GO]),
    ("asp", &[ASPNET]),
    ("iis", &[IIS, ASPNET]),
    ("apache", &[APACHE]),
    ("nginx", &[NGINX]),
    ("liferay", &[LIFERAY, JAVA]),
    ("swagger", &[SWAGGER]),
];

/// Paths for one tag, in list order with duplicates removed. Unknown tags yield nothing.
pub fn paths_for_tag(tag: &str) -> Vec<&'static str> {
    let tag = tag.to_lowercase();
    let Some((_, lists)) = TAG_LISTS.iter().find(|(name, _)| *name == tag) else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    lists
        .iter()
        .flat_map(|list| list.iter().copied())
        .filter(|path| seen.insert(*path))
        .collect()
}

pub fn known_tags() -> impl Iterator<Item = &'static str> {
    TAG_LISTS.iter().map(|(name, _)| *name)
}
