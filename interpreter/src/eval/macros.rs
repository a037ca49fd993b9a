macro_rules! try_or_fail {
	($e:expr) => {
		match $e {
			Ok(v) => v,
			Err(e) => return Control::Exit(Err(e.into())),
		}
	};
}

macro_rules! pop_u256 {
	( $machine:expr, $( $x:ident ),* ) => (
		$(
			let $x = match $machine.stack.pop() {
				Ok(value) => value,
				Err(e) => return Control::Exit(Err(e.into())),
			};
		)*
	);
}

macro_rules! pop_h256 {
	( $machine:expr, $( $x:ident ),* ) => (
		$(
			let $x = match $machine.stack.pop() {
				Ok(value) => $crate::utils::u256_to_h256(value),
				Err(e) => return Control::Exit(Err(e.into())),
			};
		)*
	);
}

macro_rules! push_u256 {
	( $machine:expr, $( $x:expr ),* ) => (
		$(
			match $machine.stack.push($x) {
				Ok(()) => (),
				Err(e) => return Control::Exit(Err(e.into())),
			}
		)*
	)
}

macro_rules! push_h256 {
	( $machine:expr, $( $x:expr ),* ) => (
		$(
			match $machine.stack.push($crate::utils::h256_to_u256($x)) {
				Ok(()) => (),
				Err(e) => return Control::Exit(Err(e.into())),
			}
		)*
	)
}

macro_rules! as_usize_or_fail {
	($v:expr) => {{
		if $v > U256::from(usize::MAX) {
			return Control::Exit(Err(ExitException::InvalidRange.into()));
		}

		$v.as_usize()
	}};

	($v:expr, $reason:expr) => {{
		if $v > U256::from(usize::MAX) {
			return Control::Exit(Err($reason.into()));
		}

		$v.as_usize()
	}};
}

macro_rules! op1_u256_fn {
	($machine:expr, $op:path) => {{
		match $machine.stack.perform_pop1_push1(|a| Ok(($op(*a), ()))) {
			Ok(()) => Control::Continue,
			Err(e) => Control::Exit(Err(e)),
		}
	}};
}

macro_rules! op2_u256_bool_ref {
	($machine:expr, $op:ident) => {{
		match $machine.stack.perform_pop2_push1(|a, b| {
			let v = if a.$op(b) { U256::one() } else { U256::zero() };
			Ok((v, ()))
		}) {
			Ok(()) => Control::Continue,
			Err(e) => Control::Exit(Err(e)),
		}
	}};
}

macro_rules! op2_u256 {
	($machine:expr, $op:ident) => {{
		match $machine.stack.perform_pop2_push1(|a, b| Ok(((*a).$op(*b), ()))) {
			Ok(()) => Control::Continue,
			Err(e) => Control::Exit(Err(e)),
		}
	}};
}

macro_rules! op2_u256_tuple {
	($machine:expr, $op:ident) => {{
		match $machine.stack.perform_pop2_push1(|a, b| {
			let (v, _) = (*a).$op(*b);
			Ok((v, ()))
		}) {
			Ok(()) => Control::Continue,
			Err(e) => Control::Exit(Err(e)),
		}
	}};
}

macro_rules! op2_u256_fn {
	($machine:expr, $op:path) => {{
		match $machine.stack.perform_pop2_push1(|a, b| Ok(($op(*a, *b), ()))) {
			Ok(()) => Control::Continue,
			Err(e) => Control::Exit(Err(e)),
		}
	}};
}

macro_rules! op3_u256_fn {
	($machine:expr, $op:path) => {{
		match $machine
			.stack
			.perform_pop3_push1(|a, b, c| Ok(($op(*a, *b, *c), ())))
		{
			Ok(()) => Control::Continue,
			Err(e) => Control::Exit(Err(e)),
		}
	}};
}
