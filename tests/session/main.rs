mod http_errors;
