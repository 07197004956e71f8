//! Event Translator Implementation
//!
//! Translators copy producer data into a claimed slot in place. The slot still
//! holds whatever the previous lap left there, so a translator must overwrite
//! every field a consumer reads.
//!
//! Closures with the matching signature implement the translator traits
//! directly, so most producers never declare a translator type.

/// Fills a claimed event without extra arguments
///
/// # Examples
/// ```
/// use ringway::disruptor::EventTranslator;
///
/// #[derive(Default)]
/// struct LongEvent {
///     value: i64,
/// }
///
/// struct SequenceStamp;
///
/// impl EventTranslator<LongEvent> for SequenceStamp {
///     fn translate_to(&self, event: &mut LongEvent, sequence: i64) {
///         event.value = sequence;
///     }
/// }
/// ```
pub trait EventTranslator<T> {
    /// Write into `event`, which occupies the slot claimed for `sequence`
    fn translate_to(&self, event: &mut T, sequence: i64);
}

/// Fills a claimed event from one argument
pub trait EventTranslatorOneArg<T, A> {
    /// Write `arg0` into `event`
    fn translate_to(&self, event: &mut T, sequence: i64, arg0: A);
}

/// Fills a claimed event from two arguments
pub trait EventTranslatorTwoArg<T, A, B> {
    /// Write `arg0` and `arg1` into `event`
    fn translate_to(&self, event: &mut T, sequence: i64, arg0: A, arg1: B);
}

impl<T, F> EventTranslator<T> for F
where
    F: Fn(&mut T, i64),
{
    fn translate_to(&self, event: &mut T, sequence: i64) {
        self(event, sequence);
    }
}

impl<T, A, F> EventTranslatorOneArg<T, A> for F
where
    F: Fn(&mut T, i64, A),
{
    fn translate_to(&self, event: &mut T, sequence: i64, arg0: A) {
        self(event, sequence, arg0);
    }
}

impl<T, A, B, F> EventTranslatorTwoArg<T, A, B> for F
where
    F: Fn(&mut T, i64, A, B),
{
    fn translate_to(&self, event: &mut T, sequence: i64, arg0: A, arg1: B) {
        self(event, sequence, arg0, arg1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct LongEvent {
        value: i64,
        sequence: i64,
    }

    struct Fixed(i64);

    impl EventTranslator<LongEvent> for Fixed {
        fn translate_to(&self, event: &mut LongEvent, sequence: i64) {
            event.value = self.0;
            event.sequence = sequence;
        }
    }

    fn translate<Tr: EventTranslator<LongEvent>>(translator: &Tr, event: &mut LongEvent, sequence: i64) {
        translator.translate_to(event, sequence);
    }

    #[test]
    fn test_struct_translator() {
        let mut event = LongEvent::default();
        translate(&Fixed(42), &mut event, 3);
        assert_eq!(event, LongEvent { value: 42, sequence: 3 });
    }

    #[test]
    fn test_closure_translator() {
        let mut event = LongEvent::default();
        translate(&|event: &mut LongEvent, sequence| event.sequence = sequence, &mut event, 9);
        assert_eq!(event.sequence, 9);
    }

    #[test]
    fn test_one_arg_translator_from_big_endian_bytes() {
        let translator = |event: &mut LongEvent, _sequence: i64, bytes: [u8; 8]| {
            event.value = i64::from_be_bytes(bytes);
        };

        let mut event = LongEvent::default();
        translator.translate_to(&mut event, 0, 1234_i64.to_be_bytes());
        assert_eq!(event.value, 1234);
    }

    #[test]
    fn test_one_arg_translator_reuses_string_slot() {
        let translator = |event: &mut String, _sequence: i64, bytes: &[u8]| {
            event.clear();
            event.push_str(&String::from_utf8_lossy(bytes));
        };

        let mut slot = String::with_capacity(32);
        let capacity = slot.capacity();
        EventTranslatorOneArg::translate_to(&translator, &mut slot, 0, "hello".as_bytes());
        EventTranslatorOneArg::translate_to(&translator, &mut slot, 1, "ring".as_bytes());

        assert_eq!(slot, "ring");
        assert_eq!(slot.capacity(), capacity);
    }

    #[test]
    fn test_two_arg_translator() {
        let translator = |event: &mut LongEvent, sequence: i64, a: i64, b: i64| {
            event.value = a * b;
            event.sequence = sequence;
        };

        let mut event = LongEvent::default();
        translator.translate_to(&mut event, 5, 6, 7);
        assert_eq!(event, LongEvent { value: 42, sequence: 5 });
    }
}
