use mailbag_common::{error::CommandError, line::CommandLine};
use mailbag_smtp::{command::Command, envelope::Body};
use proptest::prelude::*;

fn command(raw: &str) -> Command {
    Command::from(&CommandLine::parse(raw.as_bytes()).unwrap())
}

proptest! {
    #[test]
    fn mail_from_keeps_the_address(address in "[a-zA-Z0-9._%+-]{1,24}@[a-z0-9.-]{1,24}") {
        prop_assert_eq!(
            command(&format!("MAIL FROM:<{address}>\r\n")),
            Command::MailFrom(address)
        );
    }

    #[test]
    fn rcpt_to_keeps_the_address(address in "[a-zA-Z0-9._%+-]{1,24}@[a-z0-9.-]{1,24}") {
        prop_assert_eq!(
            command(&format!("RCPT TO:<{address}>\r\n")),
            Command::RcptTo(address)
        );
    }

    #[test]
    fn helo_echoes_the_domain(domain in "[a-z0-9.-]{1,32}") {
        prop_assert_eq!(command(&format!("HELO {domain}\r\n")), Command::Helo(domain));
    }

    #[test]
    fn unterminated_envelope_is_malformed(address in "[a-z]{1,12}@[a-z]{1,12}") {
        prop_assert!(
            matches!(
                command(&format!("MAIL FROM:<{address}>\n")),
                Command::Malformed { verb: "MAIL", .. }
            ),
            "bare LF accepted"
        );
    }

    #[test]
    fn body_never_exceeds_its_limit(
        lines in proptest::collection::vec("[a-z.]{0,20}\r\n", 0..20),
        limit in 1usize..200,
    ) {
        let mut body = Body::default();
        let mut refused = false;

        for line in &lines {
            match body.append(line.as_bytes(), limit) {
                Ok(()) => prop_assert!(!refused, "line accepted after a refusal"),
                Err(err) => {
                    prop_assert_eq!(err, CommandError::Capacity { limit });
                    refused = true;
                }
            }
        }

        prop_assert_eq!(body.extend(b"", limit).is_err(), refused);
        prop_assert!(body.into_content().len() <= limit);
    }

    #[test]
    fn classification_never_panics(raw in proptest::collection::vec(any::<u8>(), 3..64)) {
        if let Some(line) = CommandLine::parse(&raw) {
            let _ = Command::from(&line);
        }
    }
}
