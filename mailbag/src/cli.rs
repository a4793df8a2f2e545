use clap::Parser;

/// Command line shared by both servers: a single TCP port
#[derive(Parser, Debug, PartialEq, Eq)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// TCP port to listen on
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use clap::{Parser, error::ErrorKind};

    use super::Args;

    #[test]
    fn port_only() {
        let args = Args::try_parse_from(["mailbag-popd", "1100"]).unwrap();
        assert_eq!(args, Args { port: 1100 });
    }

    #[test]
    fn rejects_missing_port() {
        let err = Args::try_parse_from(["mailbag-popd"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_extra_arguments() {
        let err = Args::try_parse_from(["mailbag-smtpd", "2525", "extra"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn rejects_invalid_port() {
        for port in ["smtp", "70000", "-1"] {
            assert!(Args::try_parse_from(["mailbag-smtpd", port]).is_err());
        }
    }
}
