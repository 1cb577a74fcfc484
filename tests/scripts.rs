use std::{sync::Arc, thread};

use coin_script::{
    interpreter::{self, execute, Environment, Error, Flags, Limit, Limits},
    op,
    opcode::{classify, Class},
    script::{self, Code, Operation},
    signature::hash_type_of,
    Opcode,
};

fn parse(ops: &[Opcode]) -> script::OperationList {
    script::parse(&Code::serialize(ops), Flags::empty()).expect("well-formed script")
}

fn run(ops: &[Opcode]) -> Result<Vec<Vec<u8>>, Error> {
    let parsed = parse(ops);
    let mut env = Environment::new(Limits::default(), Flags::empty());
    execute(&parsed, &mut env)?;
    Ok(env.into_stack().into())
}

fn push(bytes: &[u8]) -> Opcode {
    op::pushdata_bytelength(bytes.to_vec()).expect("fits")
}

#[test]
fn notif_takes_the_else_arm_on_true() {
    assert_eq!(
        run(&[
            push(&[0x01]),
            op::NOTIF,
            push(&[0xaa]),
            op::ELSE,
            push(&[0xbb]),
            op::ENDIF,
        ]),
        Ok(vec![vec![0xbb]])
    );
}

#[test]
fn if_without_else_is_a_no_op_on_false() {
    assert_eq!(run(&[op::_0, op::IF, op::_5, op::ENDIF]), Ok(vec![]));
    assert_eq!(run(&[push(&[0x00]), op::IF, op::_5, op::ENDIF]), Ok(vec![]));
    assert_eq!(
        run(&[push(&[0x00, 0x00, 0x00]), op::IF, op::_5, op::ENDIF]),
        Ok(vec![])
    );
    assert_eq!(
        run(&[op::_7, op::_1, op::IF, op::_5, op::ENDIF]),
        Ok(vec![vec![7], vec![5]])
    );
}

#[test]
fn negative_zero_is_false() {
    assert_eq!(
        run(&[push(&[0x00, 0x80]), op::IF, op::_1, op::ELSE, op::_2, op::ENDIF]),
        Ok(vec![vec![2]])
    );
}

#[test]
fn branch_on_an_empty_stack_underflows() {
    assert_eq!(
        run(&[op::IF, op::_1, op::ENDIF]),
        Err(Error::StackUnderflow { index: 0, len: 0 })
    );
}

#[test]
fn errors_inside_a_branch_abort() {
    assert_eq!(
        run(&[op::_1, op::IF, op::RETURN, op::ENDIF, op::_1]),
        Err(Error::OpReturn)
    );
    // Untaken arms are never run.
    assert_eq!(run(&[op::_0, op::IF, op::RETURN, op::ENDIF, op::_1]), Ok(vec![vec![1]]));
}

#[test]
fn op_count_fails_exactly_when_crossed() {
    let nops = |n| (0..n).map(|_| op::NOP).collect::<Vec<_>>();
    assert_eq!(run(&nops(201)), Ok(vec![]));
    assert_eq!(
        run(&nops(202)),
        Err(Error::ResourceLimitExceeded(Limit::OpCount { max: 201 }))
    );

    // The branch itself counts once; its terminators don’t count at all.
    let mut ops = vec![op::_1, op::IF];
    ops.extend(nops(200));
    ops.push(op::ENDIF);
    assert_eq!(run(&ops), Ok(vec![]));
    ops.insert(0, op::NOP);
    assert_eq!(
        run(&ops),
        Err(Error::ResourceLimitExceeded(Limit::OpCount { max: 201 }))
    );

    // Pushes are free.
    let pushes = (0..300).map(|_| op::_1).collect::<Vec<_>>();
    assert_eq!(run(&pushes).map(|stack| stack.len()), Ok(300));
}

#[test]
fn stack_depth_includes_the_altstack() {
    let limits = Limits {
        max_stack_depth: 3,
        ..Limits::default()
    };
    let parsed = parse(&[op::_1, op::TOALTSTACK, op::_1, op::_1, op::_1, op::DROP]);
    let mut env = Environment::new(limits, Flags::empty());
    assert_eq!(
        execute(&parsed, &mut env),
        Err(Error::ResourceLimitExceeded(Limit::StackDepth { max: 3 }))
    );
}

#[test]
fn hash_type_comes_from_the_first_push() {
    let sig = [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01, 0x81];
    assert_eq!(hash_type_of(&parse(&[push(&sig), op::_1])), Some(0x81));
    assert_eq!(hash_type_of(&parse(&[])), None);
    assert_eq!(hash_type_of(&parse(&[op::_0, push(&sig)])), None);
    assert_eq!(hash_type_of(&parse(&[op::DUP, push(&sig)])), None);
    assert_eq!(
        hash_type_of(&parse(&[op::_1, op::IF, push(&sig), op::ENDIF])),
        None
    );
}

#[test]
fn parsing_keeps_the_tree_shape() {
    let parsed = parse(&[op::_1, op::IF, op::_2, op::ENDIF, op::_3]);
    assert_eq!(parsed.len(), 3);
    match &parsed.as_slice()[1] {
        Operation::Branch(branch) => {
            assert!(!branch.invert);
            assert_eq!(branch.then_branch.len(), 1);
            assert_eq!(branch.else_branch, None);
        }
        other => panic!("expected a branch, got {:?}", other),
    }
}

#[test]
fn every_byte_decodes_to_an_opcode_of_its_class() {
    for byte in 0..=u8::MAX {
        let mut script = vec![byte];
        // Enough payload for any push prefix.
        script.extend([0; 0x4b + 4]);
        let (opcode, _) = Opcode::parse(&script).expect("payload is long enough");
        assert_eq!(opcode.leading_byte(), byte);
        let expected = match &opcode {
            Opcode::PushValue(_) => Class::PushData,
            Opcode::Control(_) => Class::FlowControl,
            Opcode::Pseudo(_) => Class::Pseudo,
            Opcode::Disabled(_) => Class::Disabled,
            Opcode::Reserved(_) if classify(byte) == Class::Invalid => Class::Invalid,
            Opcode::Reserved(_) => Class::Reserved,
            Opcode::Normal(normal) => normal.class(),
        };
        assert_eq!(classify(byte), expected, "0x{:02x}", byte);
    }
}

#[test]
fn a_parsed_script_can_be_shared_across_threads() {
    let parsed = Arc::new(parse(&[
        op::_2,
        op::_3,
        op::ADD,
        op::DUP,
        op::_5,
        op::EQUAL,
        op::IF,
        op::_1ADD,
        op::ELSE,
        op::_1SUB,
        op::ENDIF,
    ]));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let parsed = Arc::clone(&parsed);
            thread::spawn(move || {
                let mut env = Environment::new(Limits::default(), Flags::empty());
                execute(&parsed, &mut env).map(|()| Vec::from(env.into_stack()))
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("no panic"), Ok(vec![vec![6]]));
    }
}

#[test]
fn reserved_opcodes_fail_only_when_run() {
    let script = Code::serialize(&[op::_0, op::IF])
        .into_iter()
        .chain([0x50, 0x68, 0x51])
        .collect::<Vec<_>>();
    assert!(script::parse(&script, Flags::empty()).is_err());
    let parsed = script::parse(&script, Flags::DeferReserved).expect("deferred");
    let mut env = Environment::new(Limits::default(), Flags::DeferReserved);
    assert_eq!(execute(&parsed, &mut env), Ok(()));

    let parsed = script::parse(&[0x50], Flags::DeferReserved).expect("deferred");
    let mut env = Environment::new(Limits::default(), Flags::DeferReserved);
    assert_eq!(
        execute(&parsed, &mut env),
        Err(interpreter::Error::InvalidOpcodeExecution(0x50))
    );
}
